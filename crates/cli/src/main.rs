use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{FileSource, UserId};
use pipeline::{RecommendationResult, RecommendationType};
use rand::seq::IndexedRandom;
use server::{
    EngineConfig, FileArtifactStore, InMemoryCache, RecommendationEngine,
    RecommendationOrchestrator,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::info;

/// basket-recs - E-commerce Recommendation Engine
#[derive(Parser)]
#[command(name = "basket-recs")]
#[command(about = "Personalized and cart-based product recommendations", long_about = None)]
struct Cli {
    /// Directory holding interactions.csv and orders.csv
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// JSON engine configuration; RECS_* environment variables otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get personalized recommendations for a customer
    Recommend {
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations to return
        #[arg(long, default_value = "5")]
        limit: usize,

        /// Show how the list was produced
        #[arg(long)]
        explain: bool,
    },

    /// Suggest items to add to a cart
    Cart {
        /// Comma-separated item ids
        #[arg(long, value_delimiter = ',', required = true)]
        items: Vec<String>,

        /// Number of suggestions (0 = configured default)
        #[arg(long, default_value = "0")]
        count: usize,
    },

    /// Retrain the model and re-mine the rules
    Retrain {
        /// Train a new model even if a stored one matches the data
        #[arg(long)]
        force: bool,
    },

    /// Show a customer's purchase history and nearest neighbors
    User {
        #[arg(long)]
        user_id: UserId,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,

        #[arg(long, default_value = "5")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let orchestrator = build_orchestrator(&cli)?;

    match cli.command {
        Commands::Recommend {
            user_id,
            limit,
            explain,
        } => handle_recommend(&orchestrator, user_id, limit, explain).await?,
        Commands::Cart { items, count } => handle_cart(&orchestrator, items, count).await?,
        Commands::Retrain { force } => handle_retrain(&orchestrator, force).await?,
        Commands::User { user_id } => handle_user(&orchestrator, user_id).await?,
        Commands::Benchmark {
            requests,
            concurrent,
            limit,
        } => handle_benchmark(&orchestrator, requests, concurrent, limit).await?,
    }

    Ok(())
}

fn build_orchestrator(cli: &Cli) -> Result<RecommendationOrchestrator> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::from_env()?,
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    info!(
        "Data from {:?}, model artifacts in {:?}",
        config.data_dir, config.artifact_dir
    );

    let source = Arc::new(FileSource::new(config.data_dir.clone()));
    let store = Arc::new(FileArtifactStore::new(config.artifact_dir.clone()));
    let engine = RecommendationEngine::new(config, source)
        .with_store(store)
        .with_cache(Arc::new(InMemoryCache::new()));
    Ok(RecommendationOrchestrator::new(Arc::new(engine)))
}

/// Load the hybrid snapshot, reusing a stored model when the data is unchanged
async fn load_snapshot(orchestrator: &RecommendationOrchestrator) -> Result<()> {
    let start = Instant::now();
    let report = orchestrator
        .retrain(false)
        .await
        .context("Failed to load interaction data")?;
    println!(
        "{} Loaded {} customers x {} items ({:?} model) in {:?}",
        "✓".green(),
        report.users,
        report.items,
        report.origin,
        start.elapsed()
    );
    Ok(())
}

/// Handle the 'recommend' command
async fn handle_recommend(
    orchestrator: &RecommendationOrchestrator,
    user_id: UserId,
    limit: usize,
    explain: bool,
) -> Result<()> {
    load_snapshot(orchestrator).await?;
    let result = orchestrator.get_recommendations(&user_id, limit).await;
    print_recommendations(&result, explain);
    Ok(())
}

/// Handle the 'cart' command
async fn handle_cart(
    orchestrator: &RecommendationOrchestrator,
    items: Vec<String>,
    count: usize,
) -> Result<()> {
    let report = orchestrator
        .refresh_rules()
        .await
        .context("Failed to load order data")?;
    println!(
        "{} Mined {} rules from {} orders",
        "✓".green(),
        report.rules,
        report.orders
    );

    let suggestions = orchestrator.get_cart_recommendations(items.clone(), count).await;
    println!("{}", format!("Suggestions for cart [{}]:", items.join(", ")).bold().blue());
    if suggestions.is_empty() {
        println!("  {}", "no matching rules".yellow());
    }
    for (idx, item) in suggestions.iter().enumerate() {
        println!("{}. {}", (idx + 1).to_string().green(), item);
    }
    Ok(())
}

/// Handle the 'retrain' command
async fn handle_retrain(orchestrator: &RecommendationOrchestrator, force: bool) -> Result<()> {
    let start = Instant::now();
    let report = orchestrator.refresh(force).await?;

    println!("{}", "Refresh complete:".bold().blue());
    println!("{}Snapshot version: {}", "• ".green(), report.retrain.version);
    println!(
        "{}Interactions: {} ({} customers, {} items)",
        "• ".green(),
        report.retrain.interactions,
        report.retrain.users,
        report.retrain.items
    );
    println!(
        "{}Model: {:?}{}",
        "• ".green(),
        report.retrain.origin,
        if report.retrain.persisted { ", saved" } else { "" }
    );
    if let Some(rmse) = report.retrain.holdout_rmse {
        println!("{}Holdout RMSE: {:.4}", "• ".cyan(), rmse);
    }
    println!(
        "{}Rules: {} from {} itemsets over {} orders",
        "• ".cyan(),
        report.rules.rules,
        report.rules.itemsets,
        report.rules.orders
    );
    println!("Took {:?}", start.elapsed());
    Ok(())
}

/// Handle the 'user' command
async fn handle_user(orchestrator: &RecommendationOrchestrator, user_id: UserId) -> Result<()> {
    load_snapshot(orchestrator).await?;
    let engine = orchestrator.engine();
    let snapshot = engine.snapshot();
    let matrix = snapshot.matrix();
    if !matrix.contains_user(&user_id) {
        return Err(anyhow!("Customer {} not found", user_id));
    }

    println!("{}", format!("Customer: {}", user_id).bold().blue());

    let mut history: Vec<(&str, f32)> = matrix
        .interacted_items(&user_id)
        .into_iter()
        .filter_map(|item| matrix.quantity(&user_id, item).map(|q| (item, q)))
        .collect();
    history.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let total: f32 = history.iter().map(|(_, q)| q).sum();
    println!("{}Distinct items: {}", "• ".cyan(), history.len());
    println!("{}Total quantity: {}", "• ".cyan(), total);
    println!("Most purchased:");
    for (item, quantity) in history.iter().take(10) {
        println!("  - {} (x{})", item, quantity);
    }

    let neighbors = engine.blender().similarity().similar_users(matrix, &user_id);
    println!("Most similar customers:");
    for neighbor in neighbors.iter().take(5) {
        println!("  - {} (similarity {:.3})", neighbor.user_id, neighbor.score);
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    orchestrator: &RecommendationOrchestrator,
    requests: usize,
    concurrent: usize,
    limit: usize,
) -> Result<()> {
    load_snapshot(orchestrator).await?;
    if requests == 0 {
        return Err(anyhow!("--requests must be at least 1"));
    }

    let known: Vec<UserId> = orchestrator.engine().snapshot().matrix().users().to_vec();
    let mut rng = rand::rng();
    // One in ten requests is for a customer the model has never seen
    let user_ids: Vec<UserId> = (0..requests)
        .map(|i| match known.choose(&mut rng) {
            Some(user) if i % 10 != 9 => user.clone(),
            _ => format!("unknown-{}", i),
        })
        .collect();

    let permits = Arc::new(Semaphore::new(concurrent.max(1)));
    let wall = Instant::now();
    let mut handles = Vec::with_capacity(requests);
    for user in user_ids {
        let orchestrator = orchestrator.clone();
        let permits = permits.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let start = Instant::now();
            let result = orchestrator.get_recommendations(&user, limit).await;
            Ok::<_, anyhow::Error>((start.elapsed(), result.recommendation_type))
        }));
    }

    let mut timings: Vec<Duration> = Vec::with_capacity(requests);
    let mut fallbacks = 0usize;
    for handle in handles {
        let (elapsed, kind) = handle.await??;
        if kind != RecommendationType::Personalized {
            fallbacks += 1;
        }
        timings.push(elapsed);
    }
    let wall_time = wall.elapsed();

    timings.sort();
    let percentile = |p: f64| timings[((timings.len() as f64 * p) as usize).min(timings.len() - 1)];
    let total: Duration = timings.iter().sum();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} concurrent)", requests, concurrent.max(1));
    println!("Total time: {:?}", wall_time);
    println!("Average latency: {:?}", total / timings.len() as u32);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Fallback responses: {}", fallbacks);
    println!(
        "Throughput: {:.2} requests/second",
        requests as f64 / wall_time.as_secs_f64().max(f64::EPSILON)
    );

    Ok(())
}

fn print_recommendations(result: &RecommendationResult, explain: bool) {
    let header = format!("Recommendations for {}:", result.user_id);
    println!("{}", header.bold().blue());

    if explain {
        let kind = match result.recommendation_type {
            RecommendationType::Personalized => result.recommendation_type.to_string().green(),
            RecommendationType::Popular => result.recommendation_type.to_string().yellow(),
            RecommendationType::PopularErrorFallback => result.recommendation_type.to_string().red(),
        };
        println!("Type: {} (known customer: {})", kind, result.user_exists);
    }

    if result.is_empty() {
        println!("  {}", "nothing to recommend".yellow());
    }
    for item in &result.recommendations {
        let note = match (&item.note, explain) {
            (Some(note), true) => format!(" [{}]", note).dimmed().to_string(),
            _ => String::new(),
        };
        println!(
            "{}. {} - Score: {:.2}{}",
            item.rank.to_string().green(),
            item.item_id,
            item.score,
            note
        );
    }
}
