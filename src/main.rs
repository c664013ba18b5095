//! TRIARB — Triangular Arbitrage Quote Monitor
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the feed → book → evaluate → detect → dispatch pipeline, and
//! runs both activities with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use triarb::book::QuoteBook;
use triarb::catalog::CycleCatalog;
use triarb::config;
use triarb::engine::crossing::CrossingDetector;
use triarb::engine::dispatch::AlertDispatcher;
use triarb::engine::evaluator::EdgeEvaluator;
use triarb::engine::monitor::Monitor;
use triarb::feed::binance::BinanceFeed;
use triarb::sinks::csv_log::CsvSink;
use triarb::sinks::telegram::TelegramNotifier;
use triarb::sinks::Notifier;

const BANNER: &str = r#"
 _____ ____  ___    _    ____  ____
|_   _|  _ \|_ _|  / \  |  _ \| __ )
  | | | |_) || |  / _ \ | |_) |  _ \
  | | |  _ < | | / ___ \|  _ <| |_) |
  |_| |_| \_\___/_/   \_\_| \_\____/

  Triangular Arbitrage Quote Monitor
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load and validate configuration from TOML. All configuration
    // errors are fatal here, before any activity begins.
    let cfg = config::AppConfig::load("config.toml")?;
    cfg.validate()?;
    let catalog = CycleCatalog::new(&cfg.cycles, &cfg.instruments)?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        monitor = %cfg.monitor.name,
        instruments = cfg.instruments.len(),
        cycles = catalog.len(),
        poll_interval_ms = cfg.monitor.poll_interval_ms,
        taker_fee = cfg.monitor.taker_fee,
        threshold = cfg.monitor.threshold,
        "TRIARB starting up"
    );

    // -- Initialise components -------------------------------------------

    let symbols = cfg.symbols();
    let book = Arc::new(QuoteBook::new());

    let sink = CsvSink::new(&cfg.log.csv_path, &symbols);
    let notifier = TelegramNotifier::from_config(&cfg.alerts)?
        .map(|n| Box::new(n) as Box<dyn Notifier>);

    let dispatcher = AlertDispatcher::new(
        Box::new(sink),
        notifier,
        cfg.alerts.cooldown_scope,
        chrono::Duration::seconds(cfg.alerts.cooldown_secs as i64),
        cfg.monitor.notional,
        cfg.monitor.taker_fee,
        cfg.monitor.threshold,
    );

    let mut monitor = Monitor::new(
        book.clone(),
        catalog,
        EdgeEvaluator::new(cfg.monitor.taker_fee),
        CrossingDetector::new(cfg.monitor.threshold, cfg.alerts.policy),
        dispatcher,
        symbols.clone(),
        Duration::from_millis(cfg.monitor.poll_interval_ms),
    );

    // -- Run both activities ---------------------------------------------

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed = BinanceFeed::new(cfg.feed.ws_url.clone(), symbols);
    let feed_handle = tokio::spawn(feed.run(book, shutdown_rx.clone()));

    tokio::select! {
        _ = monitor.run(shutdown_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    // Stop the feed and release the connection cleanly.
    let _ = shutdown_tx.send(true);
    match feed_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Feed task ended with error"),
        Err(e) => error!(error = %e, "Feed task panicked"),
    }

    info!("TRIARB shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("triarb=info"));

    let json_logging = std::env::var("TRIARB_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
