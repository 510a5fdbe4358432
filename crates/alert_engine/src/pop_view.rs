//! Precipitation-probability views over cached snapshots.
//!
//! CURRENT snapshots are cached with since-based staleness (anchored at the
//! pass's cutoff, or now when there is none) and PREVIOUS snapshots with a
//! plain wall-clock TTL. A missing snapshot is cached as `None` so regions
//! without data are not refetched on every pass.
//!
//! Recomputing CURRENT drops the region's PREVIOUS entry, so both sides of a
//! pair come from the same upstream rotation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::config::CacheConfig;
use common::{Clock, Result, Snapshot, SnapshotKind};
use region_cache::RegionCache;
use tracing::debug;

use crate::ports::SnapshotPort;

type SnapshotCache = RegionCache<Option<Arc<Snapshot>>>;

/// POP values of one snapshot keyed by offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopView {
    pub region_id: String,
    pub kind: SnapshotKind,
    pub report_time: DateTime<Utc>,
    /// Hour offset → POP percent (`None` when not reported).
    pub hourly: BTreeMap<u8, Option<i32>>,
    /// Day offset → (AM POP, PM POP).
    pub daily: BTreeMap<u8, (Option<i32>, Option<i32>)>,
}

impl PopView {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            region_id: snapshot.region_id.clone(),
            kind: snapshot.kind,
            report_time: snapshot.report_time,
            hourly: snapshot
                .hourly
                .iter()
                .map(|p| (p.hour_offset, p.pop))
                .collect(),
            daily: snapshot
                .daily
                .iter()
                .map(|d| (d.day_offset, (d.am_pop, d.pm_pop)))
                .collect(),
        }
    }

    /// POP at an hour offset; `None` when the hour is missing or unreported.
    pub fn pop_at(&self, hour_offset: u8) -> Option<i32> {
        self.hourly.get(&hour_offset).copied().flatten()
    }
}

/// A before/after pair; only built when both sides exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopViewPair {
    pub current: PopView,
    pub previous: PopView,
}

pub struct PopViewAdapter {
    port: Arc<dyn SnapshotPort>,
    current: SnapshotCache,
    previous: SnapshotCache,
    recompute_threshold_minutes: i64,
    snapshot_ttl_minutes: i64,
}

impl PopViewAdapter {
    pub fn new(port: Arc<dyn SnapshotPort>, clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        Self {
            port,
            current: RegionCache::new("snapshot:current", Arc::clone(&clock)),
            previous: RegionCache::new("snapshot:previous", clock),
            recompute_threshold_minutes: config.recompute_threshold_minutes,
            snapshot_ttl_minutes: config.snapshot_ttl_minutes,
        }
    }

    pub async fn load_current(
        &self,
        region_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<PopView>> {
        let anchor = since.unwrap_or_else(|| self.current.now());
        let port = Arc::clone(&self.port);
        let previous = &self.previous;
        let entry = self
            .current
            .get_or_compute_since_based(
                region_id,
                Some(anchor),
                self.recompute_threshold_minutes,
                || async move {
                    let snapshot =
                        fetch_shared(port.as_ref(), region_id, SnapshotKind::Current).await?;
                    if previous.invalidate(region_id) {
                        debug!(region_id, "current snapshot refreshed, dropping cached previous");
                    }
                    Ok(snapshot)
                },
            )
            .await?;
        Ok(entry.value.as_deref().map(PopView::from_snapshot))
    }

    pub async fn load_previous(&self, region_id: &str) -> Result<Option<PopView>> {
        let now = self.previous.now();
        let port = Arc::clone(&self.port);
        let entry = self
            .previous
            .get_or_compute_ttl_based(region_id, now, self.snapshot_ttl_minutes, || async move {
                fetch_shared(port.as_ref(), region_id, SnapshotKind::Previous).await
            })
            .await?;
        Ok(entry.value.as_deref().map(PopView::from_snapshot))
    }

    /// `None` unless both generations are present and PREVIOUS was reported
    /// strictly before CURRENT.
    ///
    /// CURRENT loads first: a refresh there evicts PREVIOUS before it is read.
    pub async fn load_current_previous_pair(
        &self,
        region_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<PopViewPair>> {
        let current = self.load_current(region_id, since).await?;
        let previous = self.load_previous(region_id).await?;

        match (current, previous) {
            (Some(current), Some(previous)) if previous.report_time < current.report_time => {
                Ok(Some(PopViewPair { current, previous }))
            }
            (Some(current), Some(previous)) => {
                debug!(
                    region_id,
                    current_report = %current.report_time,
                    previous_report = %previous.report_time,
                    "previous snapshot is not older than current, no comparison"
                );
                Ok(None)
            }
            (current, previous) => {
                debug!(
                    region_id,
                    has_current = current.is_some(),
                    has_previous = previous.is_some(),
                    "incomplete snapshot pair"
                );
                Ok(None)
            }
        }
    }
}

async fn fetch_shared(
    port: &dyn SnapshotPort,
    region_id: &str,
    kind: SnapshotKind,
) -> Result<Option<Arc<Snapshot>>> {
    Ok(port.fetch(region_id, kind).await?.map(Arc::new))
}
