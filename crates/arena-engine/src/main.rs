//! Arena engine server.
//!
//! Usage:
//!   arena-engine [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>    Config file path (default: config/arena.toml)
//!   --host <HOST>          Bind address (overrides config)
//!   --port <PORT>          Bind port (overrides config)
//!   --log-level <LEVEL>    Logging level (overrides config)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use arena_llm::{ProviderRegistry, StaticClient};

use arena_engine::api::{self, AppState};
use arena_engine::config::EngineConfig;
use arena_engine::engine::{PortfolioManager, TradingEngine};
use arena_engine::lanes::ParticipantLanes;
use arena_engine::market::{
    BinanceConfig, BinanceMarketData, MarketData, PriceCache, ScriptedMarketData,
};
use arena_engine::orchestrator::DecisionOrchestrator;
use arena_engine::risk::RiskMonitor;
use arena_engine::scheduler::Scheduler;
use arena_engine::store::MemoryStore;

/// CLI arguments for the arena engine.
#[derive(Parser, Debug)]
#[command(name = "arena-engine")]
#[command(about = "CFD trading competitions for language-model agents")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/arena.toml")]
    config: PathBuf,

    /// Bind address (overrides config file)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config file)
    #[arg(long)]
    port: Option<u16>,

    /// Logging level (overrides config file)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Load .env if present; only surface unexpected failures.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();

    let mut config = if args.config.exists() {
        EngineConfig::from_file(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?
    } else {
        EngineConfig::default()
    };
    config.apply_env_overrides();
    config.apply_cli_overrides(args.host, args.port, args.log_level);
    config.validate()?;

    let level = config
        .log_level
        .parse::<Level>()
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    if !args.config.exists() {
        warn!(path = ?args.config, "config file not found, using defaults");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "starting arena engine");

    // Market data venue + cache.
    let venue: Arc<dyn MarketData> = match config.market.venue.as_str() {
        "scripted" => {
            warn!("using the scripted market venue; prices must be seeded by the operator");
            Arc::new(ScriptedMarketData::new())
        }
        _ => Arc::new(BinanceMarketData::new(BinanceConfig {
            base_url: config.market.base_url.clone(),
            ..BinanceConfig::default()
        })),
    };
    let prices = Arc::new(PriceCache::new(
        Arc::clone(&venue),
        Duration::from_secs(config.market.cache_ttl_secs),
    ));

    // Model providers.
    let mut models = ProviderRegistry::from_credentials(&config.providers);
    if models.is_empty() {
        warn!("no model providers configured; registering the static provider only");
        models.register(Arc::new(StaticClient::always(
            r#"{"decision": "hold", "reasoning": "static provider", "orders": []}"#,
        )));
    }
    info!(providers = ?models.providers(), "model registry ready");
    let models = Arc::new(models);

    // Engine stack.
    let store = Arc::new(MemoryStore::new());
    let lanes = Arc::new(ParticipantLanes::new());
    let portfolios = PortfolioManager::new(Arc::clone(&store));
    let trading = Arc::new(TradingEngine::new(
        Arc::clone(&store),
        portfolios.clone(),
        Arc::clone(&prices),
    ));
    let orchestrator = Arc::new(DecisionOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&lanes),
        Arc::clone(&trading),
        Arc::clone(&prices),
        Arc::clone(&models),
    ));
    let risk = Arc::new(RiskMonitor::new(
        Arc::clone(&store),
        Arc::clone(&lanes),
        Arc::clone(&trading),
    ));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&lanes),
        portfolios.clone(),
        Arc::clone(&orchestrator),
        Arc::clone(&prices),
        Arc::clone(&risk),
        config.scheduler.to_scheduler_config(),
    ));
    Arc::clone(&scheduler).start().await;

    // REST surface.
    let state = Arc::new(AppState {
        store,
        portfolios,
        scheduler: Arc::clone(&scheduler),
        orchestrator,
        market: venue,
        api_key: config.api_key.clone(),
    });
    let app = api::router(state);

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(address = %bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("shutting down");
    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
}
