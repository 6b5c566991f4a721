use anyhow::Context;
use clap::Parser;
use reelrec::storage::{
    DelimitedCatalogFile, DelimitedProfileFile, DelimitedRatingsFile, ExternalIdResolver,
    FsArtifactStore, LinksFileResolver,
};
use reelrec::{init_tracing, Config, Engine, Strategy};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Rank movies for a user with a chosen strategy")]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// One of: mf-top-n, neighbor-propagation, ranking, genre-similarity.
    #[arg(short, long, default_value = "mf-top-n")]
    strategy: String,

    #[arg(short, long)]
    user: i64,

    /// Number of recommendations; defaults to the configured top_n.
    #[arg(short = 'n', long)]
    count: Option<usize>,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };

    let strategy: Strategy = args
        .strategy
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let count = args.count.unwrap_or(config.recommendation.top_n);

    let ratings_repo = Arc::new(DelimitedRatingsFile::new(&config.data.ratings_path));
    let catalog_source = DelimitedCatalogFile::new(&config.data.movies_path);
    let profile_repo = Arc::new(DelimitedProfileFile::new(&config.data.users_path));
    let artifact_store = Arc::new(FsArtifactStore::new(&config.data.artifacts_dir));
    let resolver = LinksFileResolver::from_file(&config.data.links_path).ok();

    let engine = Engine::bootstrap(
        config,
        ratings_repo,
        &catalog_source,
        profile_repo,
        artifact_store,
    )
    .context("Bootstrapping engine")?;

    let version = engine
        .reload_artifacts()
        .context("Loading trained artifacts (run reelrec-trainer first)")?;
    info!("Serving artifact set version {version}");

    let ranked = engine.recommender.recommend(strategy, args.user, count)?;

    println!(
        "Top {} for user {} via {}:",
        ranked.len(),
        args.user,
        strategy.as_str()
    );
    for (position, item) in ranked.iter().enumerate() {
        let title = engine
            .catalog
            .title(item.movie_id)
            .unwrap_or("<unknown title>");
        let external = resolver
            .as_ref()
            .and_then(|r| r.resolve(item.movie_id).ok())
            .unwrap_or_default();
        println!(
            "{:>3}. {:<50} score {:>7.3}  {}",
            position + 1,
            title,
            item.score,
            external
        );
    }

    Ok(())
}
