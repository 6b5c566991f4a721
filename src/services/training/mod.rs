use crate::algorithms::boosting::GradientBoostedRegressor;
use crate::algorithms::neighbors::NeighborIndex;
use crate::algorithms::scaler::StandardScaler;
use crate::algorithms::{FactorHyperParams, MatrixFactorization};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::models::{RankedItem, TrainingReport};
use crate::services::catalog::GenreVectorSpace;
use crate::services::ingestion::{RatingsStore, UserProfileStore};
use crate::storage::ArtifactStore;
use crate::utils;
use chrono::Utc;
use ndarray::Array2;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

pub const MF_ARTIFACT: &str = "mf_model";
pub const USER_NEIGHBORS_ARTIFACT: &str = "user_neighbors";
pub const ITEM_NEIGHBORS_ARTIFACT: &str = "item_neighbors";
pub const SCALER_ARTIFACT: &str = "feature_scaler";
pub const RANKER_ARTIFACT: &str = "ranking_model";

/// The complete set of artifacts one training run produces. Serving always
/// sees either a whole previous set or a whole new one, never a mixture.
pub struct TrainedArtifacts {
    pub version: u64,
    pub mf: MatrixFactorization,
    pub user_neighbors: NeighborIndex,
    pub item_neighbors: NeighborIndex,
    pub scaler: StandardScaler,
    pub ranker: GradientBoostedRegressor,
}

impl TrainedArtifacts {
    /// A neighbor index or scaler built from a different training run than
    /// the embedding it serves produces silently wrong results, so mismatched
    /// versions refuse to serve.
    pub fn verify(&self) -> Result<()> {
        let expected = self.mf.version;
        for found in [
            self.version,
            self.user_neighbors.version,
            self.item_neighbors.version,
            self.scaler.version,
            self.ranker.version,
        ] {
            if found != expected {
                return Err(EngineError::ArtifactVersionMismatch { expected, found });
            }
        }
        Ok(())
    }

    pub fn load(store: &dyn ArtifactStore) -> Result<Self> {
        let mf: MatrixFactorization = serde_json::from_slice(&store.load_artifact(MF_ARTIFACT)?)?;
        let user_neighbors: NeighborIndex =
            serde_json::from_slice(&store.load_artifact(USER_NEIGHBORS_ARTIFACT)?)?;
        let item_neighbors: NeighborIndex =
            serde_json::from_slice(&store.load_artifact(ITEM_NEIGHBORS_ARTIFACT)?)?;
        let scaler: StandardScaler =
            serde_json::from_slice(&store.load_artifact(SCALER_ARTIFACT)?)?;
        let ranker: GradientBoostedRegressor =
            serde_json::from_slice(&store.load_artifact(RANKER_ARTIFACT)?)?;

        let set = Self {
            version: mf.version,
            mf,
            user_neighbors,
            item_neighbors,
            scaler,
            ranker,
        };
        set.verify()?;
        Ok(set)
    }

    /// Score candidate movies with the ranking model for one user feature
    /// row: scale the aggregates with the frozen scaler, append each genre
    /// vector, predict, drop seen movies and sort descending.
    pub fn rank_candidates(
        &self,
        profile_features: &[f32; 2],
        candidates: &[(i64, &[f32])],
        seen: &HashSet<i64>,
    ) -> Vec<RankedItem> {
        let scaled = self.scaler.transform(profile_features);

        let scored: Vec<(i64, f32)> = candidates
            .iter()
            .filter(|(movie_id, _)| !seen.contains(movie_id))
            .map(|(movie_id, genre_vector)| {
                let mut row = scaled.clone();
                row.extend_from_slice(genre_vector);
                (*movie_id, self.ranker.predict_row(&row))
            })
            .collect();

        let count = scored.len();
        utils::sort_ranked_desc(scored, count)
            .into_iter()
            .map(|(movie_id, score)| RankedItem::new(movie_id, score))
            .collect()
    }

    fn persist(&self, store: &dyn ArtifactStore) -> Result<()> {
        store.save_artifact(MF_ARTIFACT, &serde_json::to_vec(&self.mf)?)?;
        store.save_artifact(
            USER_NEIGHBORS_ARTIFACT,
            &serde_json::to_vec(&self.user_neighbors)?,
        )?;
        store.save_artifact(
            ITEM_NEIGHBORS_ARTIFACT,
            &serde_json::to_vec(&self.item_neighbors)?,
        )?;
        store.save_artifact(SCALER_ARTIFACT, &serde_json::to_vec(&self.scaler)?)?;
        store.save_artifact(RANKER_ARTIFACT, &serde_json::to_vec(&self.ranker)?)?;
        Ok(())
    }
}

/// Holder for the currently served artifact set. Readers clone the `Arc`
/// snapshot; a retrain swaps the whole set in one write.
pub struct ArtifactState {
    current: RwLock<Option<Arc<TrainedArtifacts>>>,
}

impl Default for ArtifactState {
    fn default() -> Self {
        Self::empty()
    }
}

impl ArtifactState {
    pub fn empty() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    pub fn current(&self) -> Result<Arc<TrainedArtifacts>> {
        self.current
            .read()
            .clone()
            .ok_or_else(|| EngineError::ArtifactMissing("trained model set".to_string()))
    }

    pub fn install(&self, set: TrainedArtifacts) -> Result<()> {
        set.verify()?;
        *self.current.write() = Some(Arc::new(set));
        Ok(())
    }

    pub fn reload(&self, store: &dyn ArtifactStore) -> Result<u64> {
        let set = TrainedArtifacts::load(store)?;
        let version = set.version;
        self.install(set)?;
        Ok(version)
    }
}

/// Offline batch trainer: hyperparameter grid search for the factor model,
/// neighbor-index build, scaler fit and booster training, persisted and
/// swapped in as one unit only after everything succeeds.
pub struct TrainingService {
    ratings: Arc<RwLock<RatingsStore>>,
    catalog: Arc<GenreVectorSpace>,
    artifact_store: Arc<dyn ArtifactStore>,
    state: Arc<ArtifactState>,
    config: Arc<Config>,
}

impl TrainingService {
    pub fn new(
        ratings: Arc<RwLock<RatingsStore>>,
        catalog: Arc<GenreVectorSpace>,
        artifact_store: Arc<dyn ArtifactStore>,
        state: Arc<ArtifactState>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            ratings,
            catalog,
            artifact_store,
            state,
            config,
        }
    }

    /// Run the full batch job over the current ratings snapshot. A failure at
    /// any point leaves the previously served artifacts untouched.
    pub fn run_full_training(&self) -> Result<TrainingReport> {
        let events = self.ratings.read().events().to_vec();
        if events.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let training = &self.config.training;
        let grid: Vec<FactorHyperParams> = training
            .factor_grid
            .iter()
            .flat_map(|&k| {
                training
                    .lambda_grid
                    .iter()
                    .map(move |&lambda| FactorHyperParams { k, lambda })
            })
            .collect();
        info!(
            "Grid search over {} hyperparameter combinations on {} events",
            grid.len(),
            events.len()
        );

        // Selection is by in-sample reconstruction MSE on the full training
        // set, not a held-out split; equal scores keep the earlier grid entry.
        let mut scored: Vec<(usize, FactorHyperParams, MatrixFactorization, f32)> = grid
            .par_iter()
            .enumerate()
            .map(|(index, &params)| {
                let model = MatrixFactorization::train(
                    &events,
                    params,
                    training.epochs,
                    training.learning_rate,
                    training.seed.wrapping_add(index as u64),
                );
                let mse = model.mse(&events);
                info!(
                    "Tested k={} lambda={}: mse={:.6}",
                    params.k, params.lambda, mse
                );
                (index, params, model, mse)
            })
            .collect();

        scored.sort_by(|a, b| {
            a.3.partial_cmp(&b.3)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        let (_, best_params, mut mf, best_mse) = scored
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::ConsistencyViolation("empty hyperparameter grid".into()))?;
        info!(
            "Best parameters k={} lambda={} with mse={:.6}",
            best_params.k, best_params.lambda, best_mse
        );

        let version = Utc::now().timestamp() as u64;
        mf.version = version;

        let neighbor_k = self.config.recommendation.neighbor_k;
        let user_neighbors =
            NeighborIndex::build(version, &mf.user_ids, &mf.user_factors, neighbor_k);
        let item_neighbors =
            NeighborIndex::build(version, &mf.item_ids, &mf.item_factors, neighbor_k);

        let profiles = UserProfileStore::rebuild(&events);
        let profile_rows: Vec<Vec<f32>> = profiles
            .sorted()
            .iter()
            .map(|p| p.feature_row().to_vec())
            .collect();
        let mut scaler = StandardScaler::fit(&profile_rows);
        scaler.version = version;

        let (features, labels) = self.ranking_training_set(&events, &profiles, &scaler)?;
        let ranking_examples = labels.len();
        let mut ranker = GradientBoostedRegressor::fit(&features, &labels, &self.config.boosting);
        ranker.version = version;
        info!(
            "Trained ranking model on {} examples with {} trees",
            ranking_examples,
            ranker.tree_count()
        );

        let set = TrainedArtifacts {
            version,
            mf,
            user_neighbors,
            item_neighbors,
            scaler,
            ranker,
        };
        set.persist(self.artifact_store.as_ref())?;
        self.state.install(set)?;

        info!("Installed artifact set version {version}");
        Ok(TrainingReport {
            version,
            best_k: best_params.k,
            best_lambda: best_params.lambda,
            best_mse,
            training_events: events.len(),
            ranking_examples,
        })
    }

    /// One row per rating event whose movie has a genre vector:
    /// `[scaled avg_rating, scaled avg_hour] ++ genre vector`, labeled with
    /// the event's rating.
    fn ranking_training_set(
        &self,
        events: &[crate::models::RatingEvent],
        profiles: &UserProfileStore,
        scaler: &StandardScaler,
    ) -> Result<(Array2<f32>, Vec<f32>)> {
        let width = 2 + self.catalog.dimension();
        let mut flat = Vec::new();
        let mut labels = Vec::new();

        for event in events {
            let profile = match profiles.get(event.user_id) {
                Some(profile) => profile,
                None => continue,
            };
            let genre_vector = match self.catalog.vector(event.movie_id) {
                Some(vector) => vector,
                None => continue,
            };

            flat.extend(scaler.transform(&profile.feature_row()));
            flat.extend_from_slice(genre_vector);
            labels.push(event.rating);
        }

        let features = Array2::from_shape_vec((labels.len(), width), flat).map_err(|e| {
            EngineError::ConsistencyViolation(format!("ranking feature matrix: {e}"))
        })?;
        Ok((features, labels))
    }
}
