//! Configuration loader: merges env vars, .env file, and config.toml.

use common::config::AlertConfig;
use common::Error;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Upper bound for every minute-valued setting: one week.
const MAX_MINUTES: i64 = 7 * 24 * 60;

fn parse_i64(raw: &str, env_name: &str) -> Result<i64, Error> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer")))
}

fn parse_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn parse_regions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn validate_config(config: &AlertConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.regions.is_empty() {
        issues.push("regions must contain at least one region code".into());
    }
    if config.regions.iter().any(|r| r.trim().is_empty()) {
        issues.push("regions must not contain blank codes".into());
    }

    for (name, value) in [
        ("cache.snapshot_ttl_minutes", config.cache.snapshot_ttl_minutes),
        ("cache.daily_ttl_minutes", config.cache.daily_ttl_minutes),
        (
            "cache.recompute_threshold_minutes",
            config.cache.recompute_threshold_minutes,
        ),
    ] {
        if !(1..=MAX_MINUTES).contains(&value) {
            issues.push(format!("{name} must be in [1,{MAX_MINUTES}]"));
        }
    }

    if !(1..=24).contains(&config.rain.max_hour_limit) {
        issues.push("rain.max_hour_limit must be in [1,24]".into());
    }
    if !(0..=100).contains(&config.rain.pop_threshold) {
        issues.push("rain.pop_threshold must be in [0,100]".into());
    }

    if config.timing.pass_interval_secs == 0 {
        issues.push("timing.pass_interval_secs must be > 0".into());
    }
    if !(0..=MAX_MINUTES).contains(&config.timing.since_lookback_minutes) {
        issues.push(format!(
            "timing.since_lookback_minutes must be in [0,{MAX_MINUTES}]"
        ));
    }

    if config.fixtures_dir.trim().is_empty() {
        issues.push("fixtures_dir must not be empty".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply `WEATHER_ALERT_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut AlertConfig, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("WEATHER_ALERT_REGIONS") {
        config.regions = parse_regions(&raw);
    }
    if let Some(raw) = lookup("WEATHER_ALERT_SNAPSHOT_TTL_MINUTES") {
        config.cache.snapshot_ttl_minutes = parse_i64(&raw, "WEATHER_ALERT_SNAPSHOT_TTL_MINUTES")?;
    }
    if let Some(raw) = lookup("WEATHER_ALERT_DAILY_TTL_MINUTES") {
        config.cache.daily_ttl_minutes = parse_i64(&raw, "WEATHER_ALERT_DAILY_TTL_MINUTES")?;
    }
    if let Some(raw) = lookup("WEATHER_ALERT_RECOMPUTE_THRESHOLD_MINUTES") {
        config.cache.recompute_threshold_minutes =
            parse_i64(&raw, "WEATHER_ALERT_RECOMPUTE_THRESHOLD_MINUTES")?;
    }
    if let Some(raw) = lookup("WEATHER_ALERT_MAX_RAIN_HOUR_LIMIT") {
        config.rain.max_hour_limit = raw.trim().parse::<u8>().map_err(|_| {
            Error::Config("WEATHER_ALERT_MAX_RAIN_HOUR_LIMIT must be an integer in [1,24]".into())
        })?;
    }
    if let Some(raw) = lookup("WEATHER_ALERT_POP_THRESHOLD") {
        let parsed = parse_i64(&raw, "WEATHER_ALERT_POP_THRESHOLD")?;
        config.rain.pop_threshold = i32::try_from(parsed).map_err(|_| {
            Error::Config("WEATHER_ALERT_POP_THRESHOLD must be in [0,100]".into())
        })?;
    }
    if let Some(raw) = lookup("WEATHER_ALERT_PASS_INTERVAL_SECS") {
        config.timing.pass_interval_secs = parse_u64(&raw, "WEATHER_ALERT_PASS_INTERVAL_SECS")?;
    }
    if let Some(raw) = lookup("WEATHER_ALERT_SINCE_LOOKBACK_MINUTES") {
        config.timing.since_lookback_minutes =
            parse_i64(&raw, "WEATHER_ALERT_SINCE_LOOKBACK_MINUTES")?;
    }
    if let Some(raw) = lookup("WEATHER_ALERT_FIXTURES_DIR") {
        config.fixtures_dir = raw.trim().to_string();
    }
    Ok(())
}

/// Load configuration from environment and an optional config file.
pub fn load_config(path: Option<&Path>) -> Result<AlertConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults, then layer config.toml if it exists.
    let mut config = AlertConfig::default();
    let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    } else if path.is_some() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            config_path.display()
        )));
    }

    // 3. Environment variables take priority.
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    validate_config(&config)?;

    Ok(config)
}
