//! naive_trader - Main Entry Point
//!
//! Loads configuration, connects the Binance trade streams to the in-process
//! feed and starts one trading pool per configured symbol.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use naive_trader::binance::{BinanceRestClient, BinanceTradeStream};
use naive_trader::common::channels::{forward_events, BroadcastFeed, BroadcastOrderSink};
use naive_trader::common::traits::ExchangeClient;
use naive_trader::config::{load_config, validate, AppConfig};
use naive_trader::paper::{run_feed_bridge, PaperExchange};
use naive_trader::trader::Orchestrator;

/// How often pool status is logged
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Comma-separated list of symbols to trade; overrides the config file
    #[arg(long)]
    symbols: Option<String>,

    /// Simulate fills locally instead of sending orders
    #[arg(long)]
    paper: bool,
}

fn init_logging(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut config = load_config(Some(&args.config)).context("loading configuration")?;
    apply_overrides(&mut config, &args);
    validate(&config)?;

    init_logging(&config.settings.log_level, config.settings.json_logs);

    info!("Starting naive_trader");
    info!(
        config_file = %args.config,
        paper = config.exchange.paper_trading,
        symbols = ?config.trading.symbols,
        "Configuration loaded"
    );

    if config.trading.symbols.is_empty() {
        bail!("no symbols configured; set trading.symbols or pass --symbols");
    }

    let mut rest = BinanceRestClient::with_timeout(
        &config.exchange.rest_url,
        Duration::from_secs(config.exchange.request_timeout_seconds),
    )?
    .with_recv_window(config.exchange.recv_window_ms);
    if let Some(credentials) = config.exchange.credentials() {
        rest = rest.with_credentials(credentials);
    }

    let feed = BroadcastFeed::with_capacity(config.settings.feed_capacity);
    let sink = Arc::new(BroadcastOrderSink::with_capacity(config.settings.feed_capacity));
    let (upstream_tx, upstream_rx) = mpsc::channel(config.settings.feed_capacity);

    let (exchange, bridge) = if config.exchange.paper_trading {
        let paper = Arc::new(PaperExchange::new());
        for symbol in &config.trading.symbols {
            if config.trading.needs_filters(symbol) {
                let filters = rest
                    .symbol_filters(symbol)
                    .await
                    .with_context(|| format!("fetching filters for {}", symbol))?;
                paper.register_symbol(symbol, filters);
            }
        }
        info!("Paper trading enabled, orders stay local");
        let bridge = tokio::spawn(run_feed_bridge(upstream_rx, feed.clone(), paper.clone()));
        let exchange: Arc<dyn ExchangeClient> = paper;
        (exchange, bridge)
    } else {
        let bridge = tokio::spawn(forward_events(upstream_rx, feed.clone()));
        let exchange: Arc<dyn ExchangeClient> = Arc::new(rest);
        (exchange, bridge)
    };

    let reconnect_delay = Duration::from_millis(config.settings.reconnect_delay_ms);
    let mut streams = Vec::new();
    for symbol in &config.trading.symbols {
        let stream = BinanceTradeStream::new(&config.exchange.websocket_url, symbol)?
            .with_reconnect_delay(reconnect_delay);
        streams.push(tokio::spawn(stream.run(upstream_tx.clone())));
    }
    drop(upstream_tx);

    let order_log = tokio::spawn(log_order_updates(sink.clone()));

    let mut orchestrator = Orchestrator::new(
        config.trading.clone(),
        config.settings.clone(),
        exchange,
        sink,
        Arc::new(feed),
    );
    for symbol in &config.trading.symbols {
        if let Err(e) = orchestrator.start_trading(symbol).await {
            error!(%symbol, error = %e, "Failed to start trading");
        }
    }
    if orchestrator.trading_symbols().is_empty() {
        bail!("no symbol could be started");
    }

    info!("Application initialized successfully");

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, cleaning up...");
                break;
            }
            _ = status.tick() => log_status(&orchestrator).await,
        }
    }

    if let Err(e) = orchestrator.stop_all().await {
        warn!(error = %e, "Some pools did not stop cleanly");
    }
    for stream in streams {
        stream.abort();
    }
    bridge.abort();
    order_log.abort();

    info!("Shutdown complete");
    Ok(())
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(level) = &args.log_level {
        config.settings.log_level = level.clone();
    }
    if let Some(symbols) = &args.symbols {
        config.trading.symbols = symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if args.paper {
        config.exchange.paper_trading = true;
    }
}

async fn log_status(orchestrator: &Orchestrator) {
    for symbol in orchestrator.trading_symbols() {
        match orchestrator.snapshot(&symbol).await {
            Ok(workers) => {
                let phases: Vec<String> = workers
                    .iter()
                    .map(|w| format!("{}:{}", w.id, w.phase()))
                    .collect();
                info!(%symbol, active = workers.len(), ?phases, "Pool status");
            }
            Err(e) => warn!(%symbol, error = %e, "Pool status unavailable"),
        }
    }
}

async fn log_order_updates(sink: Arc<BroadcastOrderSink>) {
    let mut updates = sink.subscribe();
    loop {
        match updates.recv().await {
            Ok(order) => info!(
                order_id = order.order_id,
                symbol = %order.symbol,
                side = %order.side,
                price = %order.price,
                quantity = %order.quantity,
                status = %order.status,
                "Order update"
            ),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Order log fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
