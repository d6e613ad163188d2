use anyhow::{Context, Result};
use chrono::Utc;
use engine::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod config;
mod runner;

use crate::config::Config;
use crate::runner::{PaperExecutor, Runner};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Events go to stdout, logs to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Clear the daily loss counter at every UTC midnight until cancelled
async fn daily_rollover(safety: Arc<SafetyManager>, cancel: CancellationToken) {
    let now = Utc::now();
    let until_midnight = (Timeframe::OneDay.period_end(now) - now)
        .to_std()
        .unwrap_or_default();
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + until_midnight, DAY);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => safety.reset_daily(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_json);

    tracing::info!(
        git_hash = env!("GIT_HASH"),
        git_branch = env!("GIT_BRANCH"),
        build_time = env!("BUILD_TIME"),
        symbol = %config.symbol,
        "Starting confluence bot..."
    );

    let engine_config = config.engine_config()?;
    let safety = Arc::new(SafetyManager::new(engine_config.safety.clone()).context("Failed to create safety manager")?);
    safety.set_portfolio_value(config.portfolio_value);
    let mut engine = TradingEngine::new(config.symbol.clone(), engine_config).context("Failed to create trading engine")?;
    engine.set_portfolio_value(config.portfolio_value)?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
            Err(err) => tracing::error!("Failed to listen for Ctrl-C: {}", err),
        }
    });
    let rollover = tokio::spawn(daily_rollover(Arc::clone(&safety), cancel.clone()));

    tracing::info!("Reading candles from stdin...");
    let summary = Runner::new(&mut engine, &safety, PaperExecutor::new(config.slippage_percent), cancel.clone())
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    cancel.cancel();
    rollover.await.context("Daily rollover task failed")?;

    let status = safety.status();
    tracing::info!(
        candles = summary.candles,
        skipped = summary.skipped,
        fills = summary.fills,
        rejections = summary.rejections,
        circuit = %status.circuit_state,
        daily_loss = status.daily_loss,
        open_positions = status.open_positions,
        "Stopped"
    );
    if let Some(position) = engine.position() {
        tracing::warn!(
            symbol = %position.symbol,
            quantity = position.quantity,
            entry = position.entry_price,
            unrealized_pnl = position.unrealized_pnl,
            "Position still open at shutdown"
        );
    }
    Ok(())
}
