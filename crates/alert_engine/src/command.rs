//! Alert command building and validation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{Error, Result, WarningKind};
use tracing::debug;

use crate::types::{AlertCriteria, AlertType};

/// A validated-on-demand request for one evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertCommand {
    pub region_ids: Vec<String>,
    pub enabled_types: BTreeSet<AlertType>,
    pub criteria: AlertCriteria,
}

impl AlertCommand {
    /// Duplicate region ids keep their first position.
    pub fn new<I, S>(region_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let region_ids = region_ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();

        Self {
            region_ids,
            enabled_types: BTreeSet::new(),
            criteria: AlertCriteria::default(),
        }
    }

    pub fn with_types<I: IntoIterator<Item = AlertType>>(mut self, types: I) -> Self {
        self.enabled_types.extend(types);
        self
    }

    /// Enable types by wire label; unknown labels are skipped.
    pub fn with_type_labels<'a, I: IntoIterator<Item = &'a str>>(mut self, labels: I) -> Self {
        for label in labels {
            match AlertType::from_label(label) {
                Some(t) => {
                    self.enabled_types.insert(t);
                }
                None => debug!(label, "ignoring unsupported alert type"),
            }
        }
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.criteria.since = Some(since);
        self
    }

    pub fn filter_kinds<I: IntoIterator<Item = WarningKind>>(mut self, kinds: I) -> Self {
        self.criteria.filter_warning_kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn rain_hour_limit(mut self, limit: u8) -> Self {
        self.criteria.rain_hour_limit = Some(limit);
        self
    }

    /// Check the command against the configured rain-hour bound.
    pub fn validate(&self, max_hour_limit: u8) -> Result<()> {
        let mut issues: Vec<String> = Vec::new();

        if self.region_ids.is_empty() {
            issues.push("region_ids must contain at least one region".into());
        }
        if self.region_ids.iter().any(|id| id.trim().is_empty()) {
            issues.push("region_ids must not contain blank ids".into());
        }
        if let Some(limit) = self.criteria.rain_hour_limit {
            if !(1..=max_hour_limit).contains(&limit) {
                issues.push(format!(
                    "rain_hour_limit must be in 1..={max_hour_limit}, got {limit}"
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidArgument(issues.join("; ")))
        }
    }
}
