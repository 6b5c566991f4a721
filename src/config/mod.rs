use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub recommendation: RecommendationConfig,
    pub cold_start: ColdStartConfig,
    pub training: TrainingConfig,
    pub boosting: BoostingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub ratings_path: String,
    pub movies_path: String,
    pub users_path: String,
    pub links_path: String,
    pub artifacts_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub top_n: usize,
    /// Minimum cosine similarity kept by the brute-force similarity scans.
    pub similarity_threshold: f32,
    /// Neighbors retrieved per query from the precomputed indexes.
    pub neighbor_k: usize,
    /// Nearest users consumed by the neighbor-propagation strategy.
    pub propagation_neighbors: usize,
    /// Catalog sample size scored by the ranking model per request.
    pub candidate_sample: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColdStartConfig {
    pub top_n: usize,
    pub threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub factor_grid: Vec<usize>,
    pub lambda_grid: Vec<f32>,
    pub epochs: usize,
    pub learning_rate: f32,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    pub trees: usize,
    pub max_depth: usize,
    pub learning_rate: f32,
    pub min_leaf: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                ratings_path: "data/ratings.csv".to_string(),
                movies_path: "data/movies.csv".to_string(),
                users_path: "data/users.csv".to_string(),
                links_path: "data/links.csv".to_string(),
                artifacts_dir: "models".to_string(),
            },
            recommendation: RecommendationConfig {
                top_n: 10,
                similarity_threshold: 0.5,
                neighbor_k: 20,
                propagation_neighbors: 10,
                candidate_sample: 100,
            },
            cold_start: ColdStartConfig {
                top_n: 20,
                threshold: 0.8,
            },
            training: TrainingConfig {
                factor_grid: vec![5, 10, 25, 40, 60],
                lambda_grid: vec![0.001, 0.01, 0.1, 1.0, 10.0],
                epochs: 30,
                learning_rate: 0.005,
                seed: 42,
            },
            boosting: BoostingConfig {
                trees: 100,
                max_depth: 3,
                learning_rate: 0.1,
                min_leaf: 4,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("REELREC"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
