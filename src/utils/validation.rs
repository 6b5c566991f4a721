use crate::error::{EngineError, Result};
use crate::models::RatingEvent;

pub fn validate_rating_value(rating: f32) -> Result<()> {
    if !rating.is_finite() {
        return Err(EngineError::Malformed(
            "rating must be a finite number".to_string(),
        ));
    }

    if !(1.0..=5.0).contains(&rating) {
        return Err(EngineError::Malformed(format!(
            "rating {rating} outside the [1.0, 5.0] scale"
        )));
    }

    // Ratings come in half-star steps.
    let doubled = rating * 2.0;
    if (doubled - doubled.round()).abs() > 1e-6 {
        return Err(EngineError::Malformed(format!(
            "rating {rating} is not a 0.5 step"
        )));
    }

    Ok(())
}

pub fn validate_rating_event(event: &RatingEvent) -> Result<()> {
    if event.user_id <= 0 {
        return Err(EngineError::Malformed(format!(
            "user id {} must be positive",
            event.user_id
        )));
    }

    if event.movie_id <= 0 {
        return Err(EngineError::Malformed(format!(
            "movie id {} must be positive",
            event.movie_id
        )));
    }

    if event.timestamp < 0 {
        return Err(EngineError::Malformed(format!(
            "timestamp {} predates the epoch",
            event.timestamp
        )));
    }

    validate_rating_value(event.rating)
}
