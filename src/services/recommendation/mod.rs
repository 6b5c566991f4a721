use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::models::{RankedItem, Strategy};
use crate::services::catalog::GenreVectorSpace;
use crate::services::cold_start::ColdStartEngine;
use crate::services::ingestion::{RatingsStore, UserProfileStore};
use crate::services::training::ArtifactState;
use crate::utils;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// Ratings at or above this count as "liked" when a bare user id has to be
/// turned into a liked set for the genre-similarity strategy.
const LIKED_RATING_FLOOR: f32 = 4.0;

/// Pure dispatch over the recommendation strategies. Every path reads a
/// consistent snapshot (event log, profiles, trained artifact set) and
/// normalizes its output to a descending (movie, score) ranking.
pub struct RecommendationService {
    ratings: Arc<RwLock<RatingsStore>>,
    profiles: Arc<RwLock<UserProfileStore>>,
    cold_start: Arc<ColdStartEngine>,
    artifacts: Arc<ArtifactState>,
    catalog: Arc<GenreVectorSpace>,
    config: Arc<Config>,
    request_counts: DashMap<&'static str, u64>,
}

impl RecommendationService {
    pub fn new(
        ratings: Arc<RwLock<RatingsStore>>,
        profiles: Arc<RwLock<UserProfileStore>>,
        cold_start: Arc<ColdStartEngine>,
        artifacts: Arc<ArtifactState>,
        catalog: Arc<GenreVectorSpace>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            ratings,
            profiles,
            cold_start,
            artifacts,
            catalog,
            config,
            request_counts: DashMap::new(),
        }
    }

    pub fn recommend(&self, strategy: Strategy, user_id: i64, n: usize) -> Result<Vec<RankedItem>> {
        *self.request_counts.entry(strategy.as_str()).or_insert(0) += 1;
        info!(
            "Recommendation request: strategy={} user={user_id} n={n}",
            strategy.as_str()
        );

        match strategy {
            Strategy::MfTopN => self.mf_top_n(user_id, n),
            Strategy::NeighborPropagation => self.neighbor_propagation(user_id, n),
            Strategy::Ranking => self.ranking(user_id, n),
            Strategy::GenreSimilarity => self.genre_similarity(user_id, n),
        }
    }

    pub fn request_counts(&self) -> HashMap<&'static str, u64> {
        self.request_counts
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Factor-model score for one (user, movie) pair.
    pub fn predict_score(&self, user_id: i64, movie_id: i64) -> Result<f32> {
        self.artifacts.current()?.mf.predict(user_id, movie_id)
    }

    /// Nearest movies in embedding space via the precomputed index.
    pub fn similar_movies(&self, movie_id: i64) -> Result<Vec<(i64, f32)>> {
        self.artifacts.current()?.item_neighbors.neighbors_of(movie_id)
    }

    /// Nearest users in embedding space via the precomputed index.
    pub fn similar_users(&self, user_id: i64) -> Result<Vec<(i64, f32)>> {
        self.artifacts.current()?.user_neighbors.neighbors_of(user_id)
    }

    /// Exhaustive similarity scans over the raw factor matrices, filtered by
    /// the configured threshold.
    pub fn similar_movies_scan(&self, movie_id: i64) -> Result<Vec<(i64, f32)>> {
        let artifacts = self.artifacts.current()?;
        artifacts
            .mf
            .similar_movies(movie_id, self.config.recommendation.similarity_threshold)
    }

    pub fn similar_users_scan(&self, user_id: i64) -> Result<Vec<(i64, f32)>> {
        let artifacts = self.artifacts.current()?;
        artifacts
            .mf
            .similar_users(user_id, self.config.recommendation.similarity_threshold)
    }

    fn mf_top_n(&self, user_id: i64, n: usize) -> Result<Vec<RankedItem>> {
        let seen: HashSet<i64> = self.ratings.read().seen_by(user_id).into_iter().collect();
        self.artifacts.current()?.mf.top_n(user_id, &seen, n)
    }

    /// Propagate ratings from the nearest users: each unseen movie a neighbor
    /// rated contributes `rating * similarity`, summed across neighbors, and
    /// the aggregate is ranked descending. Deterministic for a fixed index
    /// and ratings snapshot.
    fn neighbor_propagation(&self, user_id: i64, n: usize) -> Result<Vec<RankedItem>> {
        let artifacts = self.artifacts.current()?;
        let neighbors: Vec<(i64, f32)> = artifacts
            .user_neighbors
            .neighbors_of(user_id)?
            .into_iter()
            .take(self.config.recommendation.propagation_neighbors)
            .collect();

        let ratings = self.ratings.read();
        let seen: HashSet<i64> = ratings.seen_by(user_id).into_iter().collect();

        let neighbor_ratings: Vec<(f32, Vec<(i64, f32)>)> = neighbors
            .into_iter()
            .map(|(neighbor_id, similarity)| (similarity, ratings.ratings_of(neighbor_id)))
            .collect();
        drop(ratings);

        Ok(aggregate_neighbor_scores(&neighbor_ratings, &seen, n))
    }

    /// Ranking-model path for a warm user: stored profile features plus a
    /// random catalog sample, seen movies excluded.
    fn ranking(&self, user_id: i64, n: usize) -> Result<Vec<RankedItem>> {
        let profile = self
            .profiles
            .read()
            .get(user_id)
            .cloned()
            .ok_or(EngineError::user_not_found(user_id))?;

        let artifacts = self.artifacts.current()?;
        let seen: HashSet<i64> = self.ratings.read().seen_by(user_id).into_iter().collect();
        let candidates = self.catalog.sample(
            self.config.recommendation.candidate_sample,
            &mut rand::thread_rng(),
        );

        let mut ranked = artifacts.rank_candidates(&profile.feature_row(), &candidates, &seen);
        ranked.truncate(n);
        Ok(ranked)
    }

    /// Genre-similarity path for a known user: the liked set is the user's
    /// ratings at or above the liked floor.
    fn genre_similarity(&self, user_id: i64, n: usize) -> Result<Vec<RankedItem>> {
        let liked: Vec<i64> = self
            .ratings
            .read()
            .ratings_of(user_id)
            .into_iter()
            .filter(|(_, rating)| *rating >= LIKED_RATING_FLOOR)
            .map(|(movie_id, _)| movie_id)
            .collect();

        let mut ranked = self.cold_start.recommend_from_liked(&liked)?;
        ranked.truncate(n);
        Ok(ranked)
    }
}

/// Sum `rating * similarity` per unseen movie across all neighbors and rank
/// the totals descending.
pub fn aggregate_neighbor_scores(
    neighbor_ratings: &[(f32, Vec<(i64, f32)>)],
    seen: &HashSet<i64>,
    n: usize,
) -> Vec<RankedItem> {
    let mut scores: HashMap<i64, f32> = HashMap::new();
    for (similarity, rated) in neighbor_ratings {
        for (movie_id, rating) in rated {
            if seen.contains(movie_id) {
                continue;
            }
            *scores.entry(*movie_id).or_insert(0.0) += rating * similarity;
        }
    }

    utils::sort_ranked_desc(scores.into_iter().collect(), n)
        .into_iter()
        .map(|(movie_id, score)| RankedItem::new(movie_id, score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_neighbor_scores() {
        // Neighbor 1 (similarity 0.9) rated B=4 and C=2; neighbor 2
        // (similarity 0.5) rated B=5. A is already seen.
        let neighbor_ratings = vec![
            (0.9, vec![(20, 4.0), (30, 2.0), (10, 5.0)]),
            (0.5, vec![(20, 5.0)]),
        ];
        let seen: HashSet<i64> = [10].into_iter().collect();

        let ranked = aggregate_neighbor_scores(&neighbor_ratings, &seen, 10);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].movie_id, 20);
        assert!((ranked[0].score - 6.1).abs() < 1e-6);
        assert_eq!(ranked[1].movie_id, 30);
        assert!((ranked[1].score - 1.8).abs() < 1e-6);
    }

    #[test]
    fn test_aggregate_excludes_all_seen() {
        let neighbor_ratings = vec![(1.0, vec![(10, 5.0)])];
        let seen: HashSet<i64> = [10].into_iter().collect();
        assert!(aggregate_neighbor_scores(&neighbor_ratings, &seen, 10).is_empty());
    }
}
