use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A single rating submitted by a user for a movie. Events are immutable once
/// recorded; an upsert for the same (user, movie) pair replaces the older
/// event, most recent timestamp winning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEvent {
    pub user_id: i64,
    pub movie_id: i64,
    pub rating: f32,
    pub timestamp: i64,
}

impl RatingEvent {
    pub fn new(user_id: i64, movie_id: i64, rating: f32, timestamp: i64) -> Self {
        Self {
            user_id,
            movie_id,
            rating,
            timestamp,
        }
    }

    pub fn pair(&self) -> (i64, i64) {
        (self.user_id, self.movie_id)
    }
}

/// Catalog row as loaded from the item source. `genres` is the raw
/// pipe-joined label string, e.g. `"Action|Comedy"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieEntry {
    pub movie_id: i64,
    pub title: String,
    pub genres: String,
}

/// Materialized per-user aggregate, rebuilt wholesale from the rating log.
/// `avg_hour` is the mean UTC hour-of-day of the user's rating timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub avg_rating: f32,
    pub avg_hour: f32,
}

impl UserProfile {
    pub fn feature_row(&self) -> [f32; 2] {
        [self.avg_rating, self.avg_hour]
    }
}

/// One entry of a normalized recommendation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub movie_id: i64,
    pub score: f32,
}

impl RankedItem {
    pub fn new(movie_id: i64, score: f32) -> Self {
        Self { movie_id, score }
    }
}

/// Per-genre score of a transient user preference vector. Display and
/// diagnostics only; never used for ranking decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreScore {
    pub genre: String,
    pub score: f32,
}

/// Which recommendation path the orchestrator dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    MfTopN,
    NeighborPropagation,
    Ranking,
    GenreSimilarity,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::MfTopN => "mf-top-n",
            Strategy::NeighborPropagation => "neighbor-propagation",
            Strategy::Ranking => "ranking",
            Strategy::GenreSimilarity => "genre-similarity",
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mf-top-n" => Ok(Strategy::MfTopN),
            "neighbor-propagation" => Ok(Strategy::NeighborPropagation),
            "ranking" => Ok(Strategy::Ranking),
            "genre-similarity" => Ok(Strategy::GenreSimilarity),
            other => Err(format!(
                "unknown strategy `{other}` (expected mf-top-n, neighbor-propagation, ranking or genre-similarity)"
            )),
        }
    }
}

/// Outcome of a successful batch ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub incoming_events: usize,
    pub merged_events: usize,
    pub profile_count: usize,
}

/// Outcome of a full offline training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub version: u64,
    pub best_k: usize,
    pub best_lambda: f32,
    pub best_mse: f32,
    pub training_events: usize,
    pub ranking_examples: usize,
}
