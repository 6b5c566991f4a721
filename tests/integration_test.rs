use reelrec::algorithms::MatrixFactorization;
use reelrec::services::ingestion::merge_new_ratings;
use reelrec::storage::{
    CatalogSource, MemoryArtifactStore, MemoryProfileRepository, MemoryRatingsRepository,
};
use reelrec::{
    Config, Engine, EngineError, MovieEntry, RatingEvent, Strategy, UserProfile,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct StaticCatalog(Vec<MovieEntry>);

impl CatalogSource for StaticCatalog {
    fn load(&self) -> reelrec::Result<Vec<MovieEntry>> {
        Ok(self.0.clone())
    }
}

fn movie(movie_id: i64, genres: &str) -> MovieEntry {
    MovieEntry {
        movie_id,
        title: format!("Movie {movie_id}"),
        genres: genres.to_string(),
    }
}

fn event(user: i64, movie: i64, rating: f32, ts: i64) -> RatingEvent {
    RatingEvent::new(user, movie, rating, ts)
}

fn test_catalog() -> Vec<MovieEntry> {
    vec![
        movie(101, "Action"),
        movie(102, "Action"),
        movie(103, "Action"),
        movie(104, "Action"),
        movie(201, "Comedy"),
        movie(202, "Comedy"),
        movie(203, "Comedy|Romance"),
        movie(301, "Drama"),
        movie(302, "Drama|Thriller"),
        movie(303, "Thriller"),
    ]
}

fn test_events() -> Vec<RatingEvent> {
    let base = 1_600_000_000;
    vec![
        event(1, 101, 5.0, base),
        event(1, 102, 4.5, base + 3_600),
        event(1, 201, 2.0, base + 7_200),
        event(2, 101, 4.0, base + 100),
        event(2, 103, 4.5, base + 200),
        event(2, 301, 3.0, base + 300),
        event(3, 201, 5.0, base + 400),
        event(3, 202, 4.5, base + 500),
        event(3, 203, 4.0, base + 600),
        event(4, 301, 4.0, base + 700),
        event(4, 302, 4.5, base + 800),
        event(4, 303, 3.5, base + 900),
        event(5, 101, 4.5, base + 1_000),
        event(5, 102, 5.0, base + 1_100),
        event(5, 201, 2.0, base + 1_200),
    ]
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.training.factor_grid = vec![2, 4];
    config.training.lambda_grid = vec![0.01, 0.1];
    config.training.epochs = 15;
    config.training.learning_rate = 0.01;
    config.training.seed = 7;
    config.boosting.trees = 10;
    config.boosting.max_depth = 3;
    config.boosting.learning_rate = 0.2;
    config.boosting.min_leaf = 2;
    config.recommendation.candidate_sample = 10;
    config
}

fn bootstrap_engine(events: Vec<RatingEvent>, profiles: Vec<UserProfile>) -> Engine {
    Engine::bootstrap(
        fast_config(),
        Arc::new(MemoryRatingsRepository::with_events(events)),
        &StaticCatalog(test_catalog()),
        Arc::new(MemoryProfileRepository::with_profiles(profiles)),
        Arc::new(MemoryArtifactStore::default()),
    )
    .unwrap()
}

#[test]
fn test_merge_pre_dedup_size_and_dedup() {
    let existing = vec![event(1, 10, 3.0, 100), event(2, 10, 4.0, 150)];
    let incoming = vec![
        event(1, 10, 4.5, 200),
        event(1, 10, 2.0, 120),
        event(3, 30, 5.0, 90),
    ];

    let merged = merge_new_ratings(&existing, &incoming).unwrap();

    // One event per pair, the greatest timestamp winning.
    assert_eq!(merged.len(), 3);
    let winner = merged.iter().find(|e| e.pair() == (1, 10)).unwrap();
    assert_eq!((winner.rating, winner.timestamp), (4.5, 200));

    let pairs: HashSet<(i64, i64)> = merged.iter().map(|e| e.pair()).collect();
    assert_eq!(pairs.len(), merged.len());
}

#[test]
fn test_ingest_batch_rebuilds_profiles() {
    let engine = bootstrap_engine(vec![], vec![]);

    let report = engine.ingestion.ingest_batch(test_events()).unwrap();

    assert_eq!(report.merged_events, 15);
    assert_eq!(report.profile_count, 5);
    assert_eq!(engine.ratings.read().len(), 15);

    let profiles = engine.profiles.read();
    let profile = profiles.get(1).unwrap();
    assert!((profile.avg_rating - (5.0 + 4.5 + 2.0) / 3.0).abs() < 1e-6);
    assert!(profile.avg_hour >= 0.0 && profile.avg_hour < 24.0);
}

#[test]
fn test_profile_shrink_rejects_batch_and_leaves_state() {
    // Profiles already cover three users, but the incoming log only covers
    // user 1: the rebuild would shrink and must be rejected wholesale.
    let stale_profiles = vec![
        UserProfile { user_id: 1, avg_rating: 3.0, avg_hour: 10.0 },
        UserProfile { user_id: 2, avg_rating: 4.0, avg_hour: 11.0 },
        UserProfile { user_id: 3, avg_rating: 2.5, avg_hour: 12.0 },
    ];
    let engine = bootstrap_engine(vec![], stale_profiles);

    let result = engine.ingestion.ingest_batch(vec![event(1, 101, 4.0, 500)]);

    assert!(matches!(result, Err(EngineError::ConsistencyViolation(_))));
    assert!(engine.ratings.read().is_empty());
    assert_eq!(engine.profiles.read().len(), 3);
}

#[test]
fn test_full_training_and_strategies() {
    let engine = bootstrap_engine(vec![], vec![]);
    engine.ingestion.ingest_batch(test_events()).unwrap();

    let report = engine.training.run_full_training().unwrap();
    assert!(report.best_mse.is_finite());
    assert_eq!(report.training_events, 15);

    let seen: HashSet<i64> = engine.ratings.read().seen_by(1).into_iter().collect();

    // MF top-N: no seen movies, scores non-increasing.
    let top = engine
        .recommender
        .recommend(Strategy::MfTopN, 1, 5)
        .unwrap();
    assert!(!top.is_empty());
    assert!(top.iter().all(|item| !seen.contains(&item.movie_id)));
    for pair in top.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // Neighbor propagation: only unseen movies, non-increasing aggregate.
    let propagated = engine
        .recommender
        .recommend(Strategy::NeighborPropagation, 1, 10)
        .unwrap();
    assert!(propagated.iter().all(|item| !seen.contains(&item.movie_id)));
    for pair in propagated.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // Ranking model: seen movies excluded, descending scores.
    let ranked = engine
        .recommender
        .recommend(Strategy::Ranking, 1, 5)
        .unwrap();
    assert!(ranked.iter().all(|item| !seen.contains(&item.movie_id)));
    for pair in ranked.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // Genre similarity: user 1 likes only Action movies (ratings >= 4), so
    // the unseen pure-Action movies come back at similarity 1.0.
    let similar = engine
        .recommender
        .recommend(Strategy::GenreSimilarity, 1, 10)
        .unwrap();
    let ids: HashSet<i64> = similar.iter().map(|item| item.movie_id).collect();
    assert_eq!(ids, HashSet::from([103, 104]));
    assert!(similar.iter().all(|item| item.score >= 0.8));

    // Direct prediction works for known pairs and fails for unknown ids.
    assert!(engine.recommender.predict_score(1, 201).is_ok());
    assert!(matches!(
        engine.recommender.predict_score(999, 201),
        Err(EngineError::NotFound { .. })
    ));

    // Indexed similarity queries stay within cosine bounds, self excluded.
    let neighbors = engine.recommender.similar_users(1).unwrap();
    assert!(!neighbors.is_empty());
    assert!(neighbors.iter().all(|(id, _)| *id != 1));
    assert!(neighbors
        .iter()
        .all(|(_, sim)| (-1.0..=1.0).contains(sim)));

    // Brute-force scan respects the configured threshold.
    let threshold = engine.config.recommendation.similarity_threshold;
    let scanned = engine.recommender.similar_movies_scan(101).unwrap();
    assert!(scanned.iter().all(|(_, sim)| *sim > threshold));
}

#[test]
fn test_serving_without_artifacts_is_distinguishable() {
    let engine = bootstrap_engine(test_events(), vec![]);

    assert!(matches!(
        engine.recommender.recommend(Strategy::MfTopN, 1, 5),
        Err(EngineError::ArtifactMissing(_))
    ));
    assert!(matches!(
        engine.reload_artifacts(),
        Err(EngineError::ArtifactMissing(_))
    ));
}

#[test]
fn test_retraining_on_superset_grows_mappings() {
    let engine = bootstrap_engine(vec![], vec![]);
    engine.ingestion.ingest_batch(test_events()).unwrap();
    engine.training.run_full_training().unwrap();

    let first = engine.artifacts.current().unwrap();
    let (users_before, movies_before) = (first.mf.user_ids.len(), first.mf.item_ids.len());

    let base = 1_700_000_000;
    engine
        .ingestion
        .ingest_batch(vec![
            event(7, 303, 4.0, base),
            event(7, 101, 3.5, base + 60),
        ])
        .unwrap();
    engine.training.run_full_training().unwrap();

    let second = engine.artifacts.current().unwrap();
    assert!(second.mf.user_ids.len() >= users_before);
    assert!(second.mf.item_ids.len() >= movies_before);
    assert!(second.mf.user_index.contains_key(&7));
}

#[test]
fn test_engineered_top_n_example() {
    // Scores are global_mean + bias + a.b = {10: 9.0, 20: 8.0, 30: 7.0}.
    let mf = MatrixFactorization {
        version: 1,
        k: 1,
        lambda: 0.0,
        global_mean: 0.0,
        user_ids: vec![1],
        item_ids: vec![10, 20, 30],
        user_index: HashMap::from([(1, 0)]),
        item_index: HashMap::from([(10, 0), (20, 1), (30, 2)]),
        user_factors: vec![vec![1.0]],
        item_factors: vec![vec![9.0], vec![8.0], vec![7.0]],
        user_bias: vec![0.0],
        item_bias: vec![0.0, 0.0, 0.0],
    };

    let exclude = HashSet::from([10]);
    let top = mf.top_n(1, &exclude, 2).unwrap();

    assert_eq!(top.len(), 2);
    assert_eq!((top[0].movie_id, top[0].score), (20, 8.0));
    assert_eq!((top[1].movie_id, top[1].score), (30, 7.0));

    assert!(matches!(
        mf.top_n(99, &exclude, 2),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn test_cold_start_for_first_session_user() {
    let engine = bootstrap_engine(vec![], vec![]);
    engine.ingestion.ingest_batch(test_events()).unwrap();
    engine.training.run_full_training().unwrap();

    let base = 1_700_000_000;
    let fresh = vec![
        event(99, 101, 5.0, base),
        event(99, 202, 3.0, base + 60),
    ];

    let ranked = engine.cold_start.recommend_for_new_user(&fresh).unwrap();
    assert!(!ranked.is_empty());
    assert!(ranked
        .iter()
        .all(|item| item.movie_id != 101 && item.movie_id != 202));
    for pair in ranked.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_artifact_version_mismatch_refuses_to_serve() {
    let engine = bootstrap_engine(vec![], vec![]);
    engine.ingestion.ingest_batch(test_events()).unwrap();
    engine.training.run_full_training().unwrap();

    let current = engine.artifacts.current().unwrap();
    let mut stale_index = current.user_neighbors.clone();
    stale_index.version = current.version.wrapping_sub(10);

    let mismatched = reelrec::services::training::TrainedArtifacts {
        version: current.version,
        mf: current.mf.clone(),
        user_neighbors: stale_index,
        item_neighbors: current.item_neighbors.clone(),
        scaler: current.scaler.clone(),
        ranker: current.ranker.clone(),
    };

    assert!(matches!(
        mismatched.verify(),
        Err(EngineError::ArtifactVersionMismatch { .. })
    ));
    assert!(matches!(
        engine.artifacts.install(mismatched),
        Err(EngineError::ArtifactVersionMismatch { .. })
    ));

    // The previously installed set keeps serving.
    assert_eq!(engine.artifacts.current().unwrap().version, current.version);
}
