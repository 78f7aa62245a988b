//! JARVIS Server - HTTP backend for the portfolio assistant.
//!
//! This binary wires the jarvis-core response pipeline to an Axum server
//! and prints the bound port on stdout so a supervisor can discover it.

mod handler;
mod handlers;
mod server;

use anyhow::Result;
use clap::Parser;
use jarvis_core::config::{AppConfig, CacheDefaults, RateLimitDefaults};
use jarvis_core::search::default_providers;
use jarvis_core::{
    CacheConfig, CacheStore, ChatCompletionsProvider, CompletionClient, CompletionConfig, Database,
    PipelineConfig, ResponsePipeline, SearchAggregator, SearchConfig, SqliteRecorder,
    StaticLocalData,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "jarvis-server")]
#[command(about = "HTTP server for the JARVIS portfolio assistant")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging and error details in responses
    #[arg(short, long)]
    debug: bool,

    /// Chat-completions API key
    #[arg(long, env = "GROQ_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// NewsAPI key; news search is disabled without it
    #[arg(long, env = "NEWSAPI_KEY", hide_env_values = true)]
    news_api_key: Option<String>,

    /// SQLite database file
    #[arg(long, default_value = "data/jarvis.db")]
    db_path: PathBuf,

    /// Default completion model
    #[arg(long)]
    model: Option<String>,

    /// Model used for retries
    #[arg(long)]
    backup_model: Option<String>,

    /// JSON file of portfolio records quoted in prompts
    #[arg(long)]
    records: Option<PathBuf>,

    /// Disable web search
    #[arg(long)]
    no_web_search: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting {} server", AppConfig::APP_NAME);

    let db = Database::open(&args.db_path)?;
    info!("Database: {}", args.db_path.display());

    let cache = Arc::new(CacheStore::with_database(db.clone(), &CacheConfig::default())?);

    let mut completion_config = CompletionConfig::with_api_key(args.api_key);
    if let Some(model) = args.model {
        completion_config.default_model = model;
    }
    if let Some(model) = args.backup_model {
        completion_config.backup_model = model;
    }
    let provider = Arc::new(ChatCompletionsProvider::new(completion_config.clone())?);
    let completion = Arc::new(CompletionClient::new(
        provider,
        cache.clone(),
        completion_config,
    )?);

    let pipeline_config = PipelineConfig {
        web_search_enabled: !args.no_web_search,
        ..PipelineConfig::default()
    };
    let mut pipeline = ResponsePipeline::new(cache.clone(), completion, pipeline_config)?
        .with_recorder(Arc::new(SqliteRecorder::new(db.clone())?));

    if !args.no_web_search {
        let search_config = SearchConfig {
            news_api_key: args.news_api_key,
            ..SearchConfig::default()
        };
        search_config.validate()?;
        let aggregator =
            SearchAggregator::new(default_providers(&search_config)?, cache.clone(), &search_config);
        info!("Web search sources: {:?}", aggregator.registered_sources());
        pipeline = pipeline.with_search(Arc::new(aggregator));
    }

    if let Some(path) = &args.records {
        let records = StaticLocalData::from_json_file(path)?;
        info!("Loaded {} local records from {}", records.len(), path.display());
        pipeline = pipeline.with_local_data(Arc::new(records));
    }

    let state = Arc::new(server::AppState::new(Arc::new(pipeline), db, args.debug));
    let _sweeper = server::spawn_cache_sweeper(cache, CacheDefaults::SWEEP_INTERVAL);
    let _limiter_cleanup = server::spawn_limiter_cleanup(state.clone(), RateLimitDefaults::WINDOW);

    // Start the server
    let addr = server::start_server(state, &args.host, args.port).await?;

    // Print port for the supervising process (intentional stdout)
    println!("JARVIS_PORT={}", addr.port());

    info!("Server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
