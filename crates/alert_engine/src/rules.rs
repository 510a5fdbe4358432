//! Rule evaluation over already-loaded data.

use std::collections::BTreeMap;

use chrono::TimeDelta;
use common::WarningMap;
use serde_json::{json, Value};

use crate::policy::is_newly_issued_since;
use crate::pop_view::PopViewPair;
use crate::types::{AlertCriteria, AlertEvent, AlertType};

/// Earliest hour at which rain newly appears in the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RainOnset {
    pub hour_offset: u8,
    pub current_pop: i32,
    pub previous_pop: i32,
}

/// One event per warning kind that passes the filter and was updated after
/// `criteria.since`, in `WarningKind` order.
pub fn warning_issued_events(
    region_id: &str,
    warnings: &WarningMap,
    criteria: &AlertCriteria,
) -> Vec<AlertEvent> {
    warnings
        .values()
        .filter(|state| criteria.allows_kind(state.kind))
        .filter(|state| is_newly_issued_since(Some(*state), criteria.since))
        .map(|state| {
            let mut payload = BTreeMap::new();
            payload.insert("kind".to_string(), json!(state.kind.code()));
            payload.insert("kindLabel".to_string(), json!(state.kind.display_label()));
            payload.insert("level".to_string(), json!(state.level.code()));
            payload.insert("levelLabel".to_string(), json!(state.level.display_label()));
            payload.insert(
                "updatedAt".to_string(),
                state
                    .updated_at
                    .map(|ts| json!(ts.to_rfc3339()))
                    .unwrap_or(Value::Null),
            );
            AlertEvent {
                alert_type: AlertType::WarningIssued,
                region_id: region_id.to_string(),
                payload,
            }
        })
        .collect()
}

/// Walk offsets `1..=hour_limit` and return the first hour that is at or
/// above `pop_threshold` now but was reported below it at the same offset in
/// the previous snapshot. Unreported values never count as a crossing.
pub fn find_rain_onset(pair: &PopViewPair, hour_limit: u8, pop_threshold: i32) -> Option<RainOnset> {
    (1..=hour_limit).find_map(|hour| {
        let current_pop = pair.current.pop_at(hour)?;
        let previous_pop = pair.previous.pop_at(hour)?;
        (current_pop >= pop_threshold && previous_pop < pop_threshold).then_some(RainOnset {
            hour_offset: hour,
            current_pop,
            previous_pop,
        })
    })
}

pub fn rain_onset_event(
    region_id: &str,
    pair: &PopViewPair,
    criteria: &AlertCriteria,
    pop_threshold: i32,
) -> Option<AlertEvent> {
    let onset = find_rain_onset(pair, criteria.effective_rain_hour_limit(), pop_threshold)?;
    let forecast_time =
        pair.current.report_time + TimeDelta::hours(i64::from(onset.hour_offset));

    let mut payload = BTreeMap::new();
    payload.insert("hourOffset".to_string(), json!(onset.hour_offset));
    payload.insert("pop".to_string(), json!(onset.current_pop));
    payload.insert("previousPop".to_string(), json!(onset.previous_pop));
    payload.insert(
        "reportTime".to_string(),
        json!(pair.current.report_time.to_rfc3339()),
    );
    payload.insert("forecastTime".to_string(), json!(forecast_time.to_rfc3339()));

    Some(AlertEvent {
        alert_type: AlertType::RainOnset,
        region_id: region_id.to_string(),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pop_view::PopView;
    use chrono::{DateTime, TimeZone, Utc};
    use common::{SnapshotKind, WarningKind, WarningLevel, WarningState};

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, minute, 0).unwrap()
    }

    fn view(kind: SnapshotKind, pops: &[(u8, Option<i32>)]) -> PopView {
        PopView {
            region_id: "11B10101".into(),
            kind,
            report_time: t(8, 0),
            hourly: pops.iter().copied().collect(),
            daily: BTreeMap::new(),
        }
    }

    fn pair(current: &[(u8, Option<i32>)], previous: &[(u8, Option<i32>)]) -> PopViewPair {
        PopViewPair {
            current: view(SnapshotKind::Current, current),
            previous: view(SnapshotKind::Previous, previous),
        }
    }

    fn warnings(states: &[(WarningKind, WarningLevel, Option<DateTime<Utc>>)]) -> WarningMap {
        states
            .iter()
            .map(|(kind, level, updated_at)| {
                (
                    *kind,
                    WarningState {
                        region_id: "11B10101".into(),
                        kind: *kind,
                        level: *level,
                        updated_at: *updated_at,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_onset_picks_earliest_crossing() {
        let p = pair(
            &[(1, Some(20)), (2, Some(60)), (3, Some(80)), (4, Some(90))],
            &[(1, Some(10)), (2, Some(70)), (3, Some(10)), (4, Some(10))],
        );
        let onset = find_rain_onset(&p, 24, 60).expect("onset expected");
        assert_eq!(onset.hour_offset, 3);
        assert_eq!(onset.current_pop, 80);
        assert_eq!(onset.previous_pop, 10);
    }

    #[test]
    fn test_onset_threshold_is_inclusive() {
        let p = pair(&[(1, Some(60))], &[(1, Some(59))]);
        assert_eq!(find_rain_onset(&p, 24, 60).map(|o| o.hour_offset), Some(1));
    }

    #[test]
    fn test_onset_respects_hour_limit() {
        let p = pair(&[(5, Some(80))], &[(5, Some(0))]);
        assert!(find_rain_onset(&p, 4, 60).is_none());
        assert_eq!(find_rain_onset(&p, 5, 60).map(|o| o.hour_offset), Some(5));
    }

    #[test]
    fn test_onset_ignores_hour_25_without_limit() {
        let p = pair(&[(25, Some(90))], &[(25, Some(0))]);
        assert!(find_rain_onset(&p, 24, 60).is_none());
    }

    #[test]
    fn test_unreported_values_never_cross() {
        let p = pair(&[(1, None), (2, Some(80))], &[(1, Some(0)), (2, None)]);
        assert!(find_rain_onset(&p, 24, 60).is_none());
    }

    #[test]
    fn test_rain_onset_event_payload() {
        let p = pair(&[(3, Some(80))], &[(3, Some(10))]);
        let criteria = AlertCriteria {
            rain_hour_limit: Some(6),
            ..Default::default()
        };

        let event = rain_onset_event("11B10101", &p, &criteria, 60).expect("event expected");
        assert_eq!(event.alert_type, AlertType::RainOnset);
        assert_eq!(event.region_id, "11B10101");
        assert_eq!(event.payload["hourOffset"], json!(3));
        assert_eq!(event.payload["pop"], json!(80));
        assert_eq!(event.payload["previousPop"], json!(10));
        assert_eq!(
            event.payload["forecastTime"],
            json!(t(11, 0).to_rfc3339())
        );
    }

    #[test]
    fn test_warning_issued_after_since() {
        let map = warnings(&[(WarningKind::Rain, WarningLevel::Warning, Some(t(10, 0)))]);
        let criteria = AlertCriteria {
            since: Some(t(9, 0)),
            ..Default::default()
        };

        let events = warning_issued_events("11B10101", &map, &criteria);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].alert_type, AlertType::WarningIssued);
        assert_eq!(events[0].payload["kind"], json!("RAIN"));
        assert_eq!(events[0].payload["level"], json!("WARNING"));
        assert_eq!(events[0].payload["updatedAt"], json!(t(10, 0).to_rfc3339()));
    }

    #[test]
    fn test_warning_not_issued_before_since() {
        let map = warnings(&[(WarningKind::Rain, WarningLevel::Warning, Some(t(10, 0)))]);
        let criteria = AlertCriteria {
            since: Some(t(11, 0)),
            ..Default::default()
        };
        assert!(warning_issued_events("11B10101", &map, &criteria).is_empty());
    }

    #[test]
    fn test_warning_filter_excludes_other_kinds() {
        let map = warnings(&[(WarningKind::Rain, WarningLevel::Warning, Some(t(10, 0)))]);
        let criteria = AlertCriteria {
            since: Some(t(9, 0)),
            filter_warning_kinds: Some([WarningKind::Heat].into_iter().collect()),
            ..Default::default()
        };
        assert!(warning_issued_events("11B10101", &map, &criteria).is_empty());
    }

    #[test]
    fn test_warning_events_follow_kind_order() {
        let map = warnings(&[
            (WarningKind::Typhoon, WarningLevel::Advisory, Some(t(10, 30))),
            (WarningKind::Rain, WarningLevel::Watch, Some(t(10, 0))),
            (WarningKind::Heat, WarningLevel::Warning, None),
        ]);
        let criteria = AlertCriteria {
            since: Some(t(9, 0)),
            ..Default::default()
        };

        let kinds: Vec<Value> = warning_issued_events("11B10101", &map, &criteria)
            .into_iter()
            .map(|e| e.payload["kind"].clone())
            .collect();
        assert_eq!(kinds, vec![json!("RAIN"), json!("TYPHOON")]);
    }
}
