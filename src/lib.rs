pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use error::{EngineError, Result};
pub use models::*;

use services::catalog::GenreVectorSpace;
use services::cold_start::ColdStartEngine;
use services::ingestion::{IngestionService, RatingsStore, UserProfileStore};
use services::recommendation::RecommendationService;
use services::training::{ArtifactState, TrainingService};
use storage::{ArtifactStore, CatalogSource, ProfileRepository, RatingsRepository};

use parking_lot::RwLock;
use std::sync::Arc;

/// Fully wired engine: shared stores, the current artifact set and the
/// services operating on them. Construction loads the ratings, profiles and
/// item catalog through the injected boundary implementations; trained
/// artifacts are loaded (or produced) separately via `reload_artifacts` /
/// the training service.
pub struct Engine {
    pub config: Arc<Config>,
    pub ratings: Arc<RwLock<RatingsStore>>,
    pub profiles: Arc<RwLock<UserProfileStore>>,
    pub catalog: Arc<GenreVectorSpace>,
    pub artifacts: Arc<ArtifactState>,
    pub ingestion: Arc<IngestionService>,
    pub cold_start: Arc<ColdStartEngine>,
    pub recommender: Arc<RecommendationService>,
    pub training: Arc<TrainingService>,
    artifact_store: Arc<dyn ArtifactStore>,
}

impl Engine {
    pub fn bootstrap(
        config: Config,
        ratings_repo: Arc<dyn RatingsRepository>,
        catalog_source: &dyn CatalogSource,
        profile_repo: Arc<dyn ProfileRepository>,
        artifact_store: Arc<dyn ArtifactStore>,
    ) -> Result<Self> {
        let config = Arc::new(config);

        let ratings = Arc::new(RwLock::new(RatingsStore::new(ratings_repo.load()?)));
        let profiles = Arc::new(RwLock::new(UserProfileStore::new(profile_repo.load()?)));
        let catalog = Arc::new(GenreVectorSpace::from_catalog(&catalog_source.load()?));
        let artifacts = Arc::new(ArtifactState::empty());

        let ingestion = Arc::new(IngestionService::new(
            ratings.clone(),
            profiles.clone(),
            ratings_repo,
            profile_repo,
        ));

        let cold_start = Arc::new(ColdStartEngine::new(
            catalog.clone(),
            artifacts.clone(),
            config.clone(),
        ));

        let recommender = Arc::new(RecommendationService::new(
            ratings.clone(),
            profiles.clone(),
            cold_start.clone(),
            artifacts.clone(),
            catalog.clone(),
            config.clone(),
        ));

        let training = Arc::new(TrainingService::new(
            ratings.clone(),
            catalog.clone(),
            artifact_store.clone(),
            artifacts.clone(),
            config.clone(),
        ));

        Ok(Self {
            config,
            ratings,
            profiles,
            catalog,
            artifacts,
            ingestion,
            cold_start,
            recommender,
            training,
            artifact_store,
        })
    }

    /// Load the persisted artifact set and swap it in, verifying that all
    /// pieces come from the same training run.
    pub fn reload_artifacts(&self) -> Result<u64> {
        self.artifacts.reload(self.artifact_store.as_ref())
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
