//! Read models shared across the workspace.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Error;

// ── Snapshot Types ────────────────────────────────────────────────────

/// Which logical snapshot generation a read model represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotKind {
    Current,
    Previous,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 2] = [SnapshotKind::Current, SnapshotKind::Previous];

    /// Stable integer used at the persistence/API boundary.
    pub fn code(&self) -> i32 {
        match self {
            Self::Current => 1,
            Self::Previous => 10,
        }
    }

    /// Unknown codes decode to `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Current),
            10 => Some(Self::Previous),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Current => "CURRENT",
            Self::Previous => "PREVIOUS",
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SnapshotKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CURRENT" => Ok(Self::Current),
            "PREVIOUS" => Ok(Self::Previous),
            other => Err(Error::unrecognized("snapshot kind", other)),
        }
    }
}

/// One forecast hour. `None` means the value was not reported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourlyPoint {
    /// Hours after the report time (1..=25).
    pub hour_offset: u8,
    pub temp: Option<i32>,
    /// Probability of precipitation, percent.
    pub pop: Option<i32>,
}

/// One forecast day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyPoint {
    /// Days after the report date (0..=6).
    pub day_offset: u8,
    pub min_temp: Option<i32>,
    pub max_temp: Option<i32>,
    pub am_pop: Option<i32>,
    pub pm_pop: Option<i32>,
}

pub const HOUR_OFFSET_RANGE: std::ops::RangeInclusive<u8> = 1..=25;
pub const DAY_OFFSET_RANGE: std::ops::RangeInclusive<u8> = 0..=6;

/// A timestamped forecast read model for one region.
///
/// `hourly` and `daily` are always present; missing upstream sections are
/// empty vectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub region_id: String,
    pub kind: SnapshotKind,
    pub report_time: DateTime<Utc>,
    pub hourly: Vec<HourlyPoint>,
    pub daily: Vec<DailyPoint>,
}

impl Snapshot {
    pub fn hourly_at(&self, hour_offset: u8) -> Option<&HourlyPoint> {
        self.hourly.iter().find(|p| p.hour_offset == hour_offset)
    }

    pub fn daily_at(&self, day_offset: u8) -> Option<&DailyPoint> {
        self.daily.iter().find(|p| p.day_offset == day_offset)
    }
}

// ── Warning Types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    Rain,
    Heat,
    Wind,
    Typhoon,
}

impl WarningKind {
    pub const ALL: [WarningKind; 4] = [
        WarningKind::Rain,
        WarningKind::Heat,
        WarningKind::Wind,
        WarningKind::Typhoon,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Rain => "RAIN",
            Self::Heat => "HEAT",
            Self::Wind => "WIND",
            Self::Typhoon => "TYPHOON",
        }
    }

    /// Label used in upstream bulletins and push templates.
    pub fn display_label(&self) -> &'static str {
        match self {
            Self::Rain => "호우",
            Self::Heat => "폭염",
            Self::Wind => "강풍",
            Self::Typhoon => "태풍",
        }
    }

    /// Accepts either the code or the display label.
    pub fn from_label(label: &str) -> Result<Self, Error> {
        let trimmed = label.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.code().eq_ignore_ascii_case(trimmed) || k.display_label() == trimmed)
            .ok_or_else(|| Error::unrecognized("warning kind", trimmed))
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for WarningKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

/// Severity, ordered `Watch < Advisory < Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningLevel {
    Watch,
    Advisory,
    Warning,
}

impl WarningLevel {
    pub const ALL: [WarningLevel; 3] = [
        WarningLevel::Watch,
        WarningLevel::Advisory,
        WarningLevel::Warning,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Watch => "WATCH",
            Self::Advisory => "ADVISORY",
            Self::Warning => "WARNING",
        }
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            Self::Watch => "예비특보",
            Self::Advisory => "주의보",
            Self::Warning => "경보",
        }
    }

    pub fn from_label(label: &str) -> Result<Self, Error> {
        let trimmed = label.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(trimmed) || l.display_label() == trimmed)
            .ok_or_else(|| Error::unrecognized("warning level", trimmed))
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for WarningLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

/// Latest known warning for one (region, kind) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningState {
    pub region_id: String,
    pub kind: WarningKind,
    pub level: WarningLevel,
    /// `None` when upstream did not report an update time.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Latest warning per kind for a region, iterated in `WarningKind` order.
pub type WarningMap = BTreeMap<WarningKind, WarningState>;
