//! scout-bot: prediction-market anomaly scanner.
//!
//! Usage:
//!   scout-bot [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>     Config file path (default: config/scout.toml)
//!   --log-level <LEVEL>     Override the configured log level
//!   --dry-run               Log alerts instead of sending them

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dashmap::DashMap;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use scout_feeds::{
    BookClient, BookConfig, CatalogClient, CatalogConfig, CryptoTickerConfig, NewsConfig,
    NewsFetcher, TelegramClient, TelegramConfig, TradesClient, TradesConfig,
};

use scout_bot::alert::{AlertDispatcher, AlertTransport, LogTransport};
use scout_bot::autobet::{AutoBetStrategist, PaperOrderPlacer};
use scout_bot::bus::EventBus;
use scout_bot::caches::{CryptoMarketCache, MarketNameResolver};
use scout_bot::config::BotConfig;
use scout_bot::enrich::AnomalyEnricher;
use scout_bot::paper::PaperTradingEngine;
use scout_bot::pipeline::{self, PipelineContext};

/// CLI arguments for scout-bot.
#[derive(Parser, Debug)]
#[command(name = "scout-bot")]
#[command(about = "Prediction-market anomaly scanner")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/scout.toml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    /// Log alerts instead of sending them
    #[arg(long)]
    dry_run: bool,
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
    // Load environment variables from .env (if present)
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    let args = Args::parse();

    let mut config = if args.config.exists() {
        BotConfig::from_file(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?
    } else {
        BotConfig::default()
    };
    config.apply_env_overrides();
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    init_logging(&config.log_level)?;
    if !args.config.exists() {
        warn!("Config file not found at {:?}, using defaults", args.config);
    }

    config.validate().context("Configuration validation failed")?;

    info!("Starting scout-bot");
    info!(
        "Alerting: min severity {}, dedup {}m",
        config.alerting.min_severity, config.alerting.dedup_minutes
    );
    info!(
        "Paper: starting balance ${}, state file {:?}",
        config.paper.starting_balance, config.paper.trades_file
    );

    // Feed clients
    let catalog = Arc::new(CatalogClient::new(CatalogConfig {
        base_url: config.feeds.catalog_base_url.clone(),
        ..CatalogConfig::default()
    }));
    let trades = Arc::new(TradesClient::new(TradesConfig {
        base_url: config.feeds.data_api_base_url.clone(),
        ..TradesConfig::default()
    }));
    let books = Arc::new(BookClient::new(BookConfig {
        base_url: config.feeds.clob_base_url.clone(),
        ..BookConfig::default()
    }));
    let news = Arc::new(NewsFetcher::new(NewsConfig {
        feed_urls: config.feeds.news_feed_urls.clone(),
        ..NewsConfig::default()
    }));

    // Transport: Telegram when configured, log-only otherwise
    let transport: Arc<dyn AlertTransport> = if args.dry_run || !config.telegram.is_configured() {
        if !args.dry_run {
            warn!("Telegram not configured, alerts will only be logged");
        }
        Arc::new(LogTransport)
    } else {
        let token = config.telegram.bot_token.clone().unwrap_or_default();
        let chat_id = config.telegram.chat_id.clone().unwrap_or_default();
        Arc::new(TelegramClient::new(TelegramConfig::new(token, chat_id)))
    };

    // Core components
    let paper = Arc::new(PaperTradingEngine::new(config.paper.clone()));
    let names = Arc::new(MarketNameResolver::new(Some(catalog.clone())));
    let dispatcher = Arc::new(AlertDispatcher::new(
        config.alerting.clone(),
        paper.clone(),
        names.clone(),
        transport,
    ));
    let strategist = Arc::new(AutoBetStrategist::new(
        config.autobet.clone(),
        Arc::new(PaperOrderPlacer::new(paper.clone())),
    ));

    let context = PipelineContext {
        bus: Arc::new(EventBus::with_defaults()),
        index: Arc::new(DashMap::new()),
        crypto_cache: Arc::new(CryptoMarketCache::new()),
        names,
        enricher: Arc::new(AnomalyEnricher::new()),
        paper,
    };

    // Spawn everything against one shutdown channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel(4);
    let mut handles = Vec::new();

    handles.push(pipeline::spawn_market_sync(
        &context,
        catalog,
        &config.feeds,
        shutdown_tx.clone(),
    ));
    handles.push(pipeline::spawn_whale_tracker(
        &context,
        trades,
        &config.feeds,
        shutdown_tx.clone(),
    ));
    handles.push(pipeline::spawn_book_scanner(
        &context,
        books,
        &config.feeds,
        shutdown_tx.clone(),
    ));
    handles.push(pipeline::spawn_news_poller(
        &context,
        news,
        &config.feeds,
        shutdown_tx.clone(),
    ));
    handles.push(pipeline::spawn_crypto_stream(
        &context,
        CryptoTickerConfig {
            ws_url: config.feeds.crypto_ws_url.clone(),
            ..CryptoTickerConfig::default()
        },
        shutdown_tx.clone(),
    ));
    handles.extend(pipeline::spawn_detector_consumers(&context, shutdown_tx.clone()));
    handles.push(pipeline::spawn_alert_subscriber(
        &context,
        dispatcher,
        shutdown_tx.clone(),
    ));
    handles.push(pipeline::spawn_autobet_subscriber(
        &context,
        strategist,
        shutdown_tx.clone(),
    ));
    handles.push(pipeline::spawn_position_tracker(
        &context,
        &config.feeds,
        shutdown_tx.clone(),
    ));
    handles.push(pipeline::spawn_daily_report(&context, shutdown_tx.clone()));

    info!("Pipeline running ({} tasks)", handles.len());

    wait_for_shutdown().await?;
    info!("Shutting down...");
    let _ = shutdown_tx.send(());
    for handle in handles {
        let _ = handle.await;
    }
    info!("Shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
