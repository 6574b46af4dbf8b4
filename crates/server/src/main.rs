//! Test harness for the recommendation engine.
//!
//! Loads the export files from `RECS_DATA_DIR`, refreshes both snapshots
//! (reusing a stored model when the data is unchanged) and prints
//! recommendations for one customer.
//!
//! Usage: `server [USER_ID] [N]`

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use data_loader::FileSource;
use server::{
    EngineConfig, FileArtifactStore, InMemoryCache, RecommendationEngine,
    RecommendationOrchestrator,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env().context("Invalid engine configuration")?;
    info!("Starting basket-recs harness with data from {:?}", config.data_dir);

    let source = Arc::new(FileSource::new(&config.data_dir));
    let store = Arc::new(FileArtifactStore::new(&config.artifact_dir));
    let engine = RecommendationEngine::new(config, source)
        .with_store(store)
        .with_cache(Arc::new(InMemoryCache::new()));
    let orchestrator = RecommendationOrchestrator::new(Arc::new(engine));

    let report = orchestrator.refresh(false).await?;
    info!(
        "Snapshot v{} ({:?}): {} users, {} items; {} rules over {} orders",
        report.retrain.version,
        report.retrain.origin,
        report.retrain.users,
        report.retrain.items,
        report.rules.rules,
        report.rules.orders
    );

    let mut args = std::env::args().skip(1);
    let user_id = match args.next() {
        Some(user_id) => user_id,
        None => orchestrator
            .engine()
            .snapshot()
            .matrix()
            .users()
            .first()
            .cloned()
            .context("No users in the loaded data")?,
    };
    let n = match args.next() {
        Some(raw) => raw.parse().context("N must be a number")?,
        None => orchestrator.engine().config().default_recommendations,
    };

    let result = orchestrator.get_recommendations(&user_id, n).await;
    info!(
        "{} recommendations for {} (known: {}, type: {})",
        result.len(),
        result.user_id,
        result.user_exists,
        result.recommendation_type
    );
    for item in &result.recommendations {
        info!(
            "{:>3}. {} - score {:.2}{}",
            item.rank,
            item.item_id,
            item.score,
            item.note.as_deref().map(|n| format!(" [{}]", n)).unwrap_or_default()
        );
    }

    let history: Vec<String> = orchestrator
        .engine()
        .snapshot()
        .matrix()
        .interacted_items(&user_id)
        .into_iter()
        .map(str::to_string)
        .collect();
    if !history.is_empty() {
        let cart = orchestrator.get_cart_recommendations(history.clone(), n).await;
        info!("Cart {:?} -> {:?}", history, cart);
    }

    Ok(())
}
