//! Upstream payload decoding.
//!
//! Forecast and warning payloads arrive as JSON from the fetch layer. Unknown
//! fields are ignored so upstream can add fields without breaking us, but
//! warning kind/level labels must map to a known variant.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::{
    DailyPoint, HourlyPoint, Snapshot, SnapshotKind, WarningKind, WarningLevel, WarningMap,
    WarningState, DAY_OFFSET_RANGE, HOUR_OFFSET_RANGE,
};
use crate::Error;

// ── Forecast payload ──────────────────────────────────────────────────

/// Forecast response for one region.
#[derive(Debug, Deserialize)]
pub struct ForecastPayload {
    #[serde(rename = "regionCode")]
    pub region_code: String,
    #[serde(rename = "announceTime")]
    pub announce_time: DateTime<Utc>,
    #[serde(default)]
    pub hourly: Option<Vec<HourlyRow>>,
    #[serde(default)]
    pub daily: Option<Vec<DailyRow>>,
}

#[derive(Debug, Deserialize)]
pub struct HourlyRow {
    #[serde(rename = "hourOffset")]
    pub hour_offset: u8,
    #[serde(default)]
    pub temp: Option<i32>,
    #[serde(default)]
    pub pop: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct DailyRow {
    #[serde(rename = "dayOffset")]
    pub day_offset: u8,
    #[serde(rename = "minTemp", default)]
    pub min_temp: Option<i32>,
    #[serde(rename = "maxTemp", default)]
    pub max_temp: Option<i32>,
    #[serde(rename = "amPop", default)]
    pub am_pop: Option<i32>,
    #[serde(rename = "pmPop", default)]
    pub pm_pop: Option<i32>,
}

impl ForecastPayload {
    /// Convert into a snapshot of the given generation.
    ///
    /// Rows with out-of-range offsets are dropped; rows are sorted by offset.
    pub fn into_snapshot(self, kind: SnapshotKind) -> Snapshot {
        let mut hourly: Vec<HourlyPoint> = self
            .hourly
            .unwrap_or_default()
            .into_iter()
            .filter(|row| HOUR_OFFSET_RANGE.contains(&row.hour_offset))
            .map(|row| HourlyPoint {
                hour_offset: row.hour_offset,
                temp: row.temp,
                pop: row.pop,
            })
            .collect();
        hourly.sort_by_key(|p| p.hour_offset);
        hourly.dedup_by_key(|p| p.hour_offset);

        let mut daily: Vec<DailyPoint> = self
            .daily
            .unwrap_or_default()
            .into_iter()
            .filter(|row| DAY_OFFSET_RANGE.contains(&row.day_offset))
            .map(|row| DailyPoint {
                day_offset: row.day_offset,
                min_temp: row.min_temp,
                max_temp: row.max_temp,
                am_pop: row.am_pop,
                pm_pop: row.pm_pop,
            })
            .collect();
        daily.sort_by_key(|p| p.day_offset);
        daily.dedup_by_key(|p| p.day_offset);

        Snapshot {
            region_id: self.region_code,
            kind,
            report_time: self.announce_time,
            hourly,
            daily,
        }
    }
}

/// Decode a forecast payload into a snapshot.
pub fn decode_snapshot(json: &str, kind: SnapshotKind) -> Result<Snapshot, Error> {
    let payload: ForecastPayload = serde_json::from_str(json)?;
    Ok(payload.into_snapshot(kind))
}

// ── Warning payload ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WarningRow {
    #[serde(rename = "regionCode")]
    pub region_code: String,
    pub kind: String,
    pub level: String,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<WarningRow> for WarningState {
    type Error = Error;

    fn try_from(row: WarningRow) -> Result<Self, Self::Error> {
        Ok(WarningState {
            kind: WarningKind::from_label(&row.kind)?,
            level: WarningLevel::from_label(&row.level)?,
            region_id: row.region_code,
            updated_at: row.updated_at,
        })
    }
}

/// Decode a warning list. Later rows for the same kind replace earlier ones
/// only when they are at least as recent.
pub fn decode_warnings(json: &str) -> Result<WarningMap, Error> {
    let rows: Vec<WarningRow> = serde_json::from_str(json)?;
    let mut map = WarningMap::new();
    for row in rows {
        let state = WarningState::try_from(row)?;
        match map.get(&state.kind) {
            Some(existing) if existing.updated_at > state.updated_at => {}
            _ => {
                map.insert(state.kind, state);
            }
        }
    }
    Ok(map)
}
