//! Alert types, criteria, and events.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use common::WarningKind;
use serde::Serialize;

/// Hours eligible for rain onset when a command sets no limit.
pub const DEFAULT_RAIN_HOUR_LIMIT: u8 = 24;

/// Rule families the engine knows how to evaluate.
///
/// Declaration order is evaluation order within a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    WarningIssued,
    RainOnset,
}

impl AlertType {
    pub const ALL: [AlertType; 2] = [AlertType::WarningIssued, AlertType::RainOnset];

    pub fn label(&self) -> &'static str {
        match self {
            Self::WarningIssued => "WARNING_ISSUED",
            Self::RainOnset => "RAIN_ONSET",
        }
    }

    /// Unknown labels yield `None` so newer callers can name types this
    /// build does not support.
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Filters applied to one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertCriteria {
    /// Lower bound for "newly issued". `None` means no bound, which the
    /// warning rule treats as never newly issued.
    pub since: Option<DateTime<Utc>>,
    /// `None` or an empty set allows every kind.
    pub filter_warning_kinds: Option<BTreeSet<WarningKind>>,
    /// Inclusive upper bound on the onset hour offset.
    pub rain_hour_limit: Option<u8>,
}

impl AlertCriteria {
    pub fn allows_kind(&self, kind: WarningKind) -> bool {
        match &self.filter_warning_kinds {
            Some(kinds) if !kinds.is_empty() => kinds.contains(&kind),
            _ => true,
        }
    }

    pub fn effective_rain_hour_limit(&self) -> u8 {
        self.rain_hour_limit.unwrap_or(DEFAULT_RAIN_HOUR_LIMIT)
    }
}

/// A notification trigger. Payload keys depend on the alert type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub region_id: String,
    pub payload: BTreeMap<String, serde_json::Value>,
}

/// A region whose evaluation failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFailure {
    pub region_id: String,
    pub reason: String,
}

/// Outcome of one pass: events in region order plus regions that failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationResult {
    pub events: Vec<AlertEvent>,
    pub failed_regions: Vec<RegionFailure>,
}
