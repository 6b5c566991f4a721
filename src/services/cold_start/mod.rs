use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::models::{GenreScore, RankedItem, RatingEvent};
use crate::services::catalog::GenreVectorSpace;
use crate::services::training::ArtifactState;
use crate::utils;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Recommendations for users without a long-term profile: a content-based
/// genre-similarity path over the catalog, and a ranking-model path driven by
/// a synthetic profile built from a handful of fresh ratings.
pub struct ColdStartEngine {
    catalog: Arc<GenreVectorSpace>,
    artifacts: Arc<ArtifactState>,
    config: Arc<Config>,
}

impl ColdStartEngine {
    pub fn new(
        catalog: Arc<GenreVectorSpace>,
        artifacts: Arc<ArtifactState>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            catalog,
            artifacts,
            config,
        }
    }

    /// Average the genre vectors of the liked movies into one preference
    /// vector. Liked ids absent from the catalog are skipped; an empty liked
    /// set, or one with no catalog hits at all, is `EmptyInput`.
    fn liked_mean_vector(&self, liked: &[i64]) -> Result<Vec<f32>> {
        if liked.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let vectors: Vec<(Vec<f32>, f32)> = liked
            .iter()
            .filter_map(|&id| self.catalog.vector(id))
            .map(|v| (v.to_vec(), 1.0))
            .collect();
        if vectors.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        Ok(utils::weighted_mean(&vectors))
    }

    /// Genre-similarity path with the configured defaults and a fresh
    /// randomized scan order.
    pub fn recommend_from_liked(&self, liked: &[i64]) -> Result<Vec<RankedItem>> {
        self.recommend_from_liked_with(
            liked,
            self.config.cold_start.top_n,
            self.config.cold_start.threshold,
            &mut rand::thread_rng(),
        )
    }

    /// Scan the catalog in randomized order and keep the first `top_n` movies
    /// whose cosine similarity to the liked-mean vector reaches `threshold`,
    /// excluding the liked movies themselves. The shuffle only diversifies
    /// tie-breaking across repeated calls; the kept set is threshold-driven.
    pub fn recommend_from_liked_with(
        &self,
        liked: &[i64],
        top_n: usize,
        threshold: f32,
        rng: &mut impl Rng,
    ) -> Result<Vec<RankedItem>> {
        let preference = self.liked_mean_vector(liked)?;
        let liked_set: HashSet<i64> = liked.iter().copied().collect();
        info!(
            "Genre similarity search: {top_n} results requested, threshold {threshold}"
        );

        let mut matches = Vec::with_capacity(top_n);
        for movie_id in self.catalog.shuffled_ids(rng) {
            if liked_set.contains(&movie_id) {
                continue;
            }
            let vector = match self.catalog.vector(movie_id) {
                Some(vector) => vector,
                None => continue,
            };
            let similarity = utils::cosine_similarity(&preference, vector);
            if similarity >= threshold {
                matches.push(RankedItem::new(movie_id, similarity));
                if matches.len() == top_n {
                    break;
                }
            }
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(matches)
    }

    /// First-session path: build a synthetic (avg rating, avg hour) profile
    /// from the freshly collected ratings and defer to the ranking model over
    /// a random catalog sample, excluding the movies just rated.
    pub fn recommend_for_new_user(&self, fresh: &[RatingEvent]) -> Result<Vec<RankedItem>> {
        self.recommend_for_new_user_with(fresh, &mut rand::thread_rng())
    }

    pub fn recommend_for_new_user_with(
        &self,
        fresh: &[RatingEvent],
        rng: &mut impl Rng,
    ) -> Result<Vec<RankedItem>> {
        if fresh.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let avg_rating = fresh.iter().map(|e| e.rating).sum::<f32>() / fresh.len() as f32;
        let avg_hour = fresh
            .iter()
            .map(|e| utils::hour_of_day_utc(e.timestamp))
            .sum::<f32>()
            / fresh.len() as f32;
        let seen: HashSet<i64> = fresh.iter().map(|e| e.movie_id).collect();
        info!(
            "Synthetic cold-start profile: avg_rating={avg_rating:.2}, avg_hour={avg_hour:.2}"
        );

        let artifacts = self.artifacts.current()?;
        let candidates = self
            .catalog
            .sample(self.config.recommendation.candidate_sample, rng);

        Ok(artifacts.rank_candidates(&[avg_rating, avg_hour], &candidates, &seen))
    }

    /// Rating-weighted per-genre preference scores, min-max normalized to
    /// [0, 1]. Display and diagnostics only.
    pub fn preference_vector(&self, liked: &[i64], ratings: &[f32]) -> Result<Vec<GenreScore>> {
        if liked.is_empty() || ratings.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let weighted: Vec<(Vec<f32>, f32)> = liked
            .iter()
            .zip(ratings.iter())
            .filter_map(|(&id, &rating)| {
                self.catalog
                    .vector(id)
                    .map(|vector| (vector.to_vec(), rating))
            })
            .collect();
        if weighted.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let raw = utils::weighted_mean(&weighted);
        let normalized = utils::min_max_normalize(&raw);

        Ok(self
            .catalog
            .genres()
            .iter()
            .zip(normalized)
            .map(|(genre, score)| GenreScore {
                genre: genre.clone(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovieEntry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entry(movie_id: i64, genres: &str) -> MovieEntry {
        MovieEntry {
            movie_id,
            title: format!("Movie {movie_id}"),
            genres: genres.to_string(),
        }
    }

    fn engine_with(entries: &[MovieEntry]) -> ColdStartEngine {
        ColdStartEngine::new(
            Arc::new(GenreVectorSpace::from_catalog(entries)),
            Arc::new(ArtifactState::empty()),
            Arc::new(Config::default()),
        )
    }

    fn engine() -> ColdStartEngine {
        engine_with(&[
            entry(1, "Action"),
            entry(2, "Action"),
            entry(3, "Comedy"),
            entry(4, "Action|Comedy"),
            entry(5, "Drama"),
        ])
    }

    #[test]
    fn test_empty_liked_set_is_rejected() {
        let engine = engine();
        assert!(matches!(
            engine.recommend_from_liked(&[]),
            Err(EngineError::EmptyInput)
        ));
        assert!(matches!(
            engine.recommend_from_liked(&[999]),
            Err(EngineError::EmptyInput)
        ));
    }

    #[test]
    fn test_threshold_and_exclusion() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(3);
        let results = engine
            .recommend_from_liked_with(&[1], 10, 0.8, &mut rng)
            .unwrap();

        // Only the other pure-Action movie reaches 0.8 similarity; the liked
        // movie itself is excluded.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].movie_id, 2);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preference_vector_weighted_and_normalized() {
        let engine = engine();
        let scores = engine.preference_vector(&[1, 3], &[5.0, 1.0]).unwrap();

        // Raw weighted mean over (Action, Comedy, Drama) is [2.5, 0.5, 0.0];
        // min-max maps Action to 1.0 and Comedy to 0.2.
        assert_eq!(scores[0].genre, "Action");
        assert!((scores[0].score - 1.0).abs() < 1e-6);
        assert_eq!(scores[1].genre, "Comedy");
        assert!((scores[1].score - 0.2).abs() < 1e-6);
        for score in &scores {
            assert!((0.0..=1.0).contains(&score.score));
        }
    }

    #[test]
    fn test_preference_vector_constant_scores_map_to_zero() {
        let engine = engine_with(&[entry(4, "Action|Comedy")]);
        let scores = engine.preference_vector(&[4], &[4.0]).unwrap();
        // Every genre ties; the degenerate min-max maps all of them to zero.
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.score == 0.0));
    }

    #[test]
    fn test_new_user_path_requires_artifacts() {
        let engine = engine();
        let fresh = vec![RatingEvent::new(9, 1, 5.0, 1_000)];
        assert!(matches!(
            engine.recommend_for_new_user(&fresh),
            Err(EngineError::ArtifactMissing(_))
        ));
        assert!(matches!(
            engine.recommend_for_new_user(&[]),
            Err(EngineError::EmptyInput)
        ));
    }
}
