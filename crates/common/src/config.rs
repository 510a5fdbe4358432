//! Alert service configuration types.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Region codes evaluated on every pass.
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,

    /// Cache staleness settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Rain-onset rule settings.
    #[serde(default)]
    pub rain: RainConfig,

    /// Pass scheduling.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Directory holding per-region forecast/warning payloads.
    #[serde(default = "default_fixtures_dir")]
    pub fixtures_dir: String,
}

/// Cache TTLs, all in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL of the PREVIOUS snapshot cache.
    #[serde(default = "default_snapshot_ttl")]
    pub snapshot_ttl_minutes: i64,

    /// TTL of the warning-state cache, which follows the daily bulletin cadence.
    #[serde(default = "default_daily_ttl")]
    pub daily_ttl_minutes: i64,

    /// Since-based threshold of the CURRENT snapshot cache.
    #[serde(default = "default_recompute_threshold")]
    pub recompute_threshold_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RainConfig {
    /// Upper bound accepted for a command's rain-hour limit (1..=24).
    #[serde(default = "default_max_hour_limit")]
    pub max_hour_limit: u8,

    /// POP percentage at or above which an hour counts as "will rain".
    #[serde(default = "default_pop_threshold")]
    pub pop_threshold: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Interval between evaluation passes.
    #[serde(default = "default_pass_interval")]
    pub pass_interval_secs: u64,

    /// How far back the "since" cutoff of a scheduled pass reaches.
    #[serde(default = "default_since_lookback")]
    pub since_lookback_minutes: i64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_regions() -> Vec<String> {
    vec!["11B10101".into()]
}
fn default_fixtures_dir() -> String {
    "fixtures".into()
}

fn default_snapshot_ttl() -> i64 {
    180
}
fn default_daily_ttl() -> i64 {
    60
}
fn default_recompute_threshold() -> i64 {
    165
}

fn default_max_hour_limit() -> u8 {
    24
}
fn default_pop_threshold() -> i32 {
    60
}

fn default_pass_interval() -> u64 {
    600
}
fn default_since_lookback() -> i64 {
    60
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            regions: default_regions(),
            cache: CacheConfig::default(),
            rain: RainConfig::default(),
            timing: TimingConfig::default(),
            fixtures_dir: default_fixtures_dir(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl_minutes: default_snapshot_ttl(),
            daily_ttl_minutes: default_daily_ttl(),
            recompute_threshold_minutes: default_recompute_threshold(),
        }
    }
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            max_hour_limit: default_max_hour_limit(),
            pop_threshold: default_pop_threshold(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pass_interval_secs: default_pass_interval(),
            since_lookback_minutes: default_since_lookback(),
        }
    }
}
