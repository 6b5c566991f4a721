use anyhow::Context;
use clap::Parser;
use reelrec::storage::{
    DelimitedCatalogFile, DelimitedProfileFile, DelimitedRatingsFile, FsArtifactStore,
};
use reelrec::{init_tracing, Config, Engine};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Offline batch training job", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    info!("Starting reelrec training job");

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    info!("Training configuration: {:?}", config.training);

    let ratings_repo = Arc::new(DelimitedRatingsFile::new(&config.data.ratings_path));
    let catalog_source = DelimitedCatalogFile::new(&config.data.movies_path);
    let profile_repo = Arc::new(DelimitedProfileFile::new(&config.data.users_path));
    let artifact_store = Arc::new(FsArtifactStore::new(&config.data.artifacts_dir));

    let engine = Engine::bootstrap(
        config,
        ratings_repo,
        &catalog_source,
        profile_repo,
        artifact_store,
    )
    .context("Bootstrapping engine")?;

    let report = engine
        .training
        .run_full_training()
        .context("Running full training")?;

    info!(
        "Training complete: version={} best k={} lambda={} mse={:.6} ({} events, {} ranking examples)",
        report.version,
        report.best_k,
        report.best_lambda,
        report.best_mse,
        report.training_events,
        report.ranking_examples
    );

    Ok(())
}
