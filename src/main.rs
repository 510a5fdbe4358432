//! weather-alert: push-alert evaluation service.
//!
//! Single-binary Tokio application that:
//! 1. Loads forecast snapshots and warning states per region
//! 2. Evaluates the warning-issued and rain-onset rules
//! 3. Hands resulting events to the push dispatcher

mod config;
mod fixtures;

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::TimeDelta;
use clap::Parser;
use tokio::time::sleep;
use tracing::{error, info, warn};

use alert_engine::{
    dispatch_all, AlertCommand, AlertDispatcher, AlertRuleEngine, AlertType, SnapshotPort,
    WarningPort,
};
use common::config::AlertConfig;
use common::{Clock, SystemClock};
use fixtures::{FixtureSnapshotPort, FixtureWarningPort, LogDispatcher};

/// Weather push-alert evaluator
#[derive(Parser)]
#[command(name = "weather-alert", about = "Weather push-alert rule engine")]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single evaluation pass and exit.
    #[arg(long)]
    once: bool,

    /// Override the fixture directory from the config.
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Alert type labels to evaluate, comma separated. Defaults to all.
    #[arg(long, value_delimiter = ',')]
    types: Vec<String>,

    /// Rain-onset lookahead in hours.
    #[arg(long)]
    rain_hour_limit: Option<u8>,
}

fn build_command(cfg: &AlertConfig, cli: &Cli, clock: &dyn Clock) -> AlertCommand {
    let mut command = AlertCommand::new(cfg.regions.iter().cloned());

    let now = clock.now();
    match TimeDelta::try_minutes(cfg.timing.since_lookback_minutes)
        .and_then(|lookback| now.checked_sub_signed(lookback))
    {
        Some(since) => command = command.since(since),
        None => warn!(
            "Lookback of {} minutes is out of range, running without a since cutoff",
            cfg.timing.since_lookback_minutes
        ),
    }

    command = if cli.types.is_empty() {
        command.with_types(AlertType::ALL)
    } else {
        command.with_type_labels(cli.types.iter().map(String::as_str))
    };

    if let Some(limit) = cli.rain_hour_limit {
        command = command.rain_hour_limit(limit);
    }
    command
}

async fn run_pass(
    engine: &AlertRuleEngine,
    dispatcher: &dyn AlertDispatcher,
    command: &AlertCommand,
) {
    let result = match engine.evaluate(command).await {
        Ok(r) => r,
        Err(e) => {
            error!("Evaluation rejected: {}", e);
            return;
        }
    };

    for failure in &result.failed_regions {
        warn!(
            "Region {} skipped this pass: {}",
            failure.region_id, failure.reason
        );
    }

    let summary = dispatch_all(dispatcher, &result.events).await;
    info!(
        "Pass done: {} events, {} delivered, {} failed deliveries, {} failed regions",
        result.events.len(),
        summary.delivered.len(),
        summary.failed,
        result.failed_regions.len(),
    );
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "weather_alert=info,alert_engine=info,region_cache=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("Weather alert service starting up...");

    // Load configuration.
    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let fixtures_dir = cli
        .fixtures
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.fixtures_dir));

    info!("Regions: {:?}", cfg.regions);
    info!(
        "Cache: previous_ttl={}m, warning_ttl={}m, current_threshold={}m",
        cfg.cache.snapshot_ttl_minutes,
        cfg.cache.daily_ttl_minutes,
        cfg.cache.recompute_threshold_minutes,
    );
    info!(
        "Rain: pop>={}%, max_hour_limit={}",
        cfg.rain.pop_threshold, cfg.rain.max_hour_limit
    );
    info!("Fixtures: {}", fixtures_dir.display());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let snapshots: Arc<dyn SnapshotPort> = Arc::new(FixtureSnapshotPort::new(&fixtures_dir));
    let warnings: Arc<dyn WarningPort> = Arc::new(FixtureWarningPort::new(&fixtures_dir));
    let engine = AlertRuleEngine::new(&cfg, snapshots, warnings, Arc::clone(&clock));
    let dispatcher = LogDispatcher;

    let interval = Duration::from_secs(cfg.timing.pass_interval_secs);

    loop {
        let command = build_command(&cfg, &cli, clock.as_ref());
        run_pass(&engine, &dispatcher, &command).await;

        if cli.once {
            info!("Single pass complete, exiting.");
            break;
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, exiting.");
                break;
            }
        }
    }
}
