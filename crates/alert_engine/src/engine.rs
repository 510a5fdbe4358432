//! Alert rule engine.
//!
//! Evaluates every region of a command concurrently against cached snapshot
//! and warning data, then concatenates per-region events in command order.
//! A region that fails to load is reported in `failed_regions` and does not
//! affect the others.

use std::sync::Arc;

use common::config::AlertConfig;
use common::{Clock, Result};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::command::AlertCommand;
use crate::pop_view::PopViewAdapter;
use crate::ports::{SnapshotPort, WarningPort};
use crate::rules::{rain_onset_event, warning_issued_events};
use crate::types::{AlertEvent, AlertType, EvaluationResult, RegionFailure};
use crate::warnings::WarningLoader;

/// The engine that turns snapshot/warning changes into alert events.
pub struct AlertRuleEngine {
    pop_views: PopViewAdapter,
    warnings: WarningLoader,
    max_hour_limit: u8,
    pop_threshold: i32,
}

impl AlertRuleEngine {
    pub fn new(
        config: &AlertConfig,
        snapshots: Arc<dyn SnapshotPort>,
        warnings: Arc<dyn WarningPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pop_views: PopViewAdapter::new(snapshots, Arc::clone(&clock), &config.cache),
            warnings: WarningLoader::new(warnings, clock, config.cache.daily_ttl_minutes),
            max_hour_limit: config.rain.max_hour_limit,
            pop_threshold: config.rain.pop_threshold,
        }
    }

    pub fn pop_views(&self) -> &PopViewAdapter {
        &self.pop_views
    }

    /// Run one evaluation pass.
    ///
    /// Fails only when the command itself is invalid.
    pub async fn evaluate(&self, command: &AlertCommand) -> Result<EvaluationResult> {
        command.validate(self.max_hour_limit)?;

        if command.enabled_types.is_empty() {
            debug!("no alert types enabled, nothing to evaluate");
            return Ok(EvaluationResult::default());
        }

        let outcomes = join_all(
            command
                .region_ids
                .iter()
                .map(|region_id| self.evaluate_region(region_id, command)),
        )
        .await;

        let mut result = EvaluationResult::default();
        for (region_id, outcome) in command.region_ids.iter().zip(outcomes) {
            match outcome {
                Ok(events) => result.events.extend(events),
                Err(e) => {
                    warn!(region_id = %region_id, error = %e, "region evaluation failed");
                    result.failed_regions.push(RegionFailure {
                        region_id: region_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            regions = command.region_ids.len(),
            events = result.events.len(),
            failed = result.failed_regions.len(),
            "evaluation pass complete"
        );
        Ok(result)
    }

    async fn evaluate_region(
        &self,
        region_id: &str,
        command: &AlertCommand,
    ) -> Result<Vec<AlertEvent>> {
        let criteria = &command.criteria;
        let mut events = Vec::new();

        for alert_type in &command.enabled_types {
            match alert_type {
                AlertType::WarningIssued => {
                    // Without a cutoff nothing can be newly issued.
                    if criteria.since.is_none() {
                        debug!(region_id, "no since cutoff, skipping warning rule");
                        continue;
                    }
                    let warnings = self.warnings.load_latest(region_id).await?;
                    let issued = warning_issued_events(region_id, &warnings, criteria);
                    for event in &issued {
                        info!(
                            region_id,
                            kind = %event.payload["kind"],
                            level = %event.payload["level"],
                            "WARNING ISSUED"
                        );
                    }
                    events.extend(issued);
                }
                AlertType::RainOnset => {
                    let Some(pair) = self
                        .pop_views
                        .load_current_previous_pair(region_id, criteria.since)
                        .await?
                    else {
                        debug!(region_id, "no snapshot pair, skipping rain rule");
                        continue;
                    };
                    if let Some(event) =
                        rain_onset_event(region_id, &pair, criteria, self.pop_threshold)
                    {
                        info!(
                            region_id,
                            hour_offset = %event.payload["hourOffset"],
                            "RAIN ONSET"
                        );
                        events.push(event);
                    }
                }
            }
        }

        Ok(events)
    }
}
