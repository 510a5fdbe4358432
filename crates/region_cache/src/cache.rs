//! In-memory, per-region cache with single-flight recomputation.
//!
//! Each region owns a slot behind its own async mutex. The `DashMap` only
//! guards slot lookup/creation, so a long recomputation for one region never
//! blocks callers working on another.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use common::{Clock, Error, Result};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A cached value with provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    /// Wall-clock minute the value was computed.
    pub computed_at: DateTime<Utc>,
    /// Timestamp the value was computed for.
    pub reference_time: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// True when `anchor` has drifted more than `ttl_minutes` past the
    /// entry's reference time. A TTL too large to represent never expires.
    pub fn is_stale_at(&self, anchor: DateTime<Utc>, ttl_minutes: i64) -> bool {
        match TimeDelta::try_minutes(ttl_minutes) {
            Some(ttl) => anchor - self.reference_time > ttl,
            None => false,
        }
    }
}

type Slot<T> = Arc<Mutex<Option<CacheEntry<T>>>>;

/// Thread-safe cache keyed by region id.
pub struct RegionCache<T> {
    name: &'static str,
    slots: DashMap<String, Slot<T>>,
    clock: Arc<dyn Clock>,
}

impl<T> std::fmt::Debug for RegionCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionCache")
            .field("name", &self.name)
            .field("regions", &self.slots.len())
            .finish()
    }
}

impl<T: Clone + Send> RegionCache<T> {
    /// `name` only labels log lines.
    pub fn new(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            slots: DashMap::new(),
            clock,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current minute according to the cache's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Number of regions holding a slot.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pure lookup; never creates a slot. Waits while a recompute for the
    /// same region is in flight and then returns its result.
    pub async fn get(&self, region_id: &str) -> Option<CacheEntry<T>> {
        let slot = self.slots.get(region_id).map(|s| Arc::clone(s.value()))?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Unconditional overwrite.
    pub async fn put(&self, region_id: &str, entry: CacheEntry<T>) {
        let slot = self.slot(region_id);
        *slot.lock().await = Some(entry);
    }

    /// Drop a region's slot. A computation already running against the old
    /// slot finishes without affecting later lookups.
    pub fn invalidate(&self, region_id: &str) -> bool {
        self.slots.remove(region_id).is_some()
    }

    /// Return the cached entry unless it is missing or stale relative to
    /// `since`; otherwise run `computer` under the region's slot and store
    /// its result.
    ///
    /// A `None` anchor always recomputes. Concurrent callers for the same
    /// region queue on the slot, so a burst against an unexpired entry runs
    /// `computer` at most once. If `computer` fails nothing is written and
    /// the previous entry stays in place.
    pub async fn get_or_compute_since_based<F, Fut>(
        &self,
        region_id: &str,
        since: Option<DateTime<Utc>>,
        ttl_minutes: i64,
        computer: F,
    ) -> Result<CacheEntry<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if region_id.trim().is_empty() {
            return Err(Error::InvalidArgument("region id must not be empty".into()));
        }
        if ttl_minutes < 0 {
            return Err(Error::InvalidArgument(format!(
                "ttl_minutes must be >= 0, got {ttl_minutes}"
            )));
        }

        let slot = self.slot(region_id);
        let mut guard = slot.lock().await;

        if let (Some(entry), Some(anchor)) = (guard.as_ref(), since) {
            if !entry.is_stale_at(anchor, ttl_minutes) {
                debug!(cache = self.name, region_id, "cache hit");
                return Ok(entry.clone());
            }
        }

        debug!(
            cache = self.name,
            region_id,
            has_entry = guard.is_some(),
            anchored = since.is_some(),
            "recomputing"
        );

        let value = match computer().await {
            Ok(v) => v,
            Err(e) => {
                warn!(cache = self.name, region_id, error = %e, "recompute failed, keeping previous entry");
                return Err(e);
            }
        };

        let now = self.clock.now();
        let entry = CacheEntry {
            value,
            computed_at: now,
            reference_time: since.unwrap_or(now),
        };
        *guard = Some(entry.clone());
        Ok(entry)
    }

    /// Wall-clock TTL: since-based staleness anchored at `now`.
    pub async fn get_or_compute_ttl_based<F, Fut>(
        &self,
        region_id: &str,
        now: DateTime<Utc>,
        ttl_minutes: i64,
        computer: F,
    ) -> Result<CacheEntry<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.get_or_compute_since_based(region_id, Some(now), ttl_minutes, computer)
            .await
    }

    fn slot(&self, region_id: &str) -> Slot<T> {
        let slot = self
            .slots
            .entry(region_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)));
        Arc::clone(slot.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::FixedClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, minute, 0).unwrap()
    }

    fn make_cache(now: DateTime<Utc>) -> (Arc<FixedClock>, RegionCache<String>) {
        let clock = Arc::new(FixedClock::new(now));
        let cache = RegionCache::new("test", clock.clone() as Arc<dyn Clock>);
        (clock, cache)
    }

    #[tokio::test]
    async fn test_miss_computes_once_and_stores() {
        let (_clock, cache) = make_cache(t(10, 0));
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let entry = cache
            .get_or_compute_since_based("11B10101", Some(t(9, 0)), 60, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("fresh".to_string())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(entry.value, "fresh");
        assert_eq!(entry.reference_time, t(9, 0));
        assert_eq!(entry.computed_at, t(10, 0));
        assert_eq!(cache.get("11B10101").await, Some(entry));
    }

    #[tokio::test]
    async fn test_hit_within_ttl_skips_computer() {
        let (_clock, cache) = make_cache(t(10, 0));
        cache
            .put(
                "11B10101",
                CacheEntry {
                    value: "cached".to_string(),
                    computed_at: t(9, 0),
                    reference_time: t(9, 0),
                },
            )
            .await;

        let calls = AtomicUsize::new(0);
        let counter = &calls;

        // Exactly ttl minutes of drift is still fresh.
        let entry = cache
            .get_or_compute_since_based("11B10101", Some(t(10, 0)), 60, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("recomputed".to_string())
            })
            .await
            .unwrap();
        assert_eq!(entry.value, "cached");

        // An anchor earlier than the reference time is fresh too.
        let entry = cache
            .get_or_compute_since_based("11B10101", Some(t(8, 0)), 0, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("recomputed".to_string())
            })
            .await
            .unwrap();
        assert_eq!(entry.value, "cached");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drift_beyond_ttl_recomputes() {
        let (_clock, cache) = make_cache(t(12, 0));
        cache
            .put(
                "11B10101",
                CacheEntry {
                    value: "old".to_string(),
                    computed_at: t(9, 0),
                    reference_time: t(9, 0),
                },
            )
            .await;

        let entry = cache
            .get_or_compute_since_based("11B10101", Some(t(10, 1)), 60, || async {
                Ok("new".to_string())
            })
            .await
            .unwrap();

        assert_eq!(entry.value, "new");
        assert_eq!(entry.reference_time, t(10, 1));
        assert_eq!(entry.computed_at, t(12, 0));
    }

    #[tokio::test]
    async fn test_absent_since_always_recomputes() {
        let (_clock, cache) = make_cache(t(10, 0));
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..3 {
            let entry = cache
                .get_or_compute_since_based("11B10101", None, 600, || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok("v".to_string())
                })
                .await
                .unwrap();
            assert_eq!(entry.reference_time, t(10, 0));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_ttl_based_matches_since_based() {
        let (clock, ttl_cache) = make_cache(t(10, 0));
        let since_cache = RegionCache::new("since", clock.clone() as Arc<dyn Clock>);

        for (minute, expected_calls) in [(0i64, 1usize), (30, 0), (61, 1)] {
            clock.set(t(10, 0) + TimeDelta::minutes(minute));
            let now = clock.now();
            let ttl_calls = AtomicUsize::new(0);
            let since_calls = AtomicUsize::new(0);
            let (ttl_counter, since_counter) = (&ttl_calls, &since_calls);

            let a = ttl_cache
                .get_or_compute_ttl_based("r", now, 60, || async move {
                    ttl_counter.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("v{minute}"))
                })
                .await
                .unwrap();
            let b = since_cache
                .get_or_compute_since_based("r", Some(now), 60, || async move {
                    since_counter.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("v{minute}"))
                })
                .await
                .unwrap();

            assert_eq!(a, b);
            assert_eq!(ttl_calls.load(Ordering::SeqCst), expected_calls);
            assert_eq!(since_calls.load(Ordering::SeqCst), expected_calls);
        }

        assert_eq!(ttl_cache.get("r").await.unwrap().value, "v61");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_burst_runs_computer_once() {
        let (clock, cache) = make_cache(t(10, 0));
        let cache = Arc::new(cache);
        let calls = Arc::new(AtomicUsize::new(0));
        let now = clock.now();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute_ttl_based("11B10101", now, 180, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok("winner".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            let entry = handle.await.unwrap().unwrap();
            assert_eq!(entry.value, "winner");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_regions_do_not_block_each_other() {
        let (clock, cache) = make_cache(t(10, 0));
        let cache = Arc::new(cache);
        let release = Arc::new(Notify::new());
        let now = clock.now();

        let slow = {
            let cache = Arc::clone(&cache);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                cache
                    .get_or_compute_ttl_based("slow", now, 60, || async move {
                        release.notified().await;
                        Ok("slow".to_string())
                    })
                    .await
            })
        };

        let fast = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get_or_compute_ttl_based("fast", now, 60, || async { Ok("fast".to_string()) }),
        )
        .await
        .expect("other region must not wait on the slow slot")
        .unwrap();
        assert_eq!(fast.value, "fast");

        release.notify_one();
        assert_eq!(slow.await.unwrap().unwrap().value, "slow");
    }

    #[tokio::test]
    async fn test_failed_compute_keeps_previous_entry() {
        let (_clock, cache) = make_cache(t(12, 0));
        let previous = CacheEntry {
            value: "old".to_string(),
            computed_at: t(8, 0),
            reference_time: t(8, 0),
        };
        cache.put("11B10101", previous.clone()).await;

        let result = cache
            .get_or_compute_since_based("11B10101", Some(t(12, 0)), 60, || async {
                Err(Error::Upstream("timeout".into()))
            })
            .await;

        assert!(matches!(result, Err(Error::Upstream(_))));
        assert_eq!(cache.get("11B10101").await, Some(previous));

        // A retry after the failure recomputes against the same entry.
        let entry = cache
            .get_or_compute_since_based("11B10101", Some(t(12, 0)), 60, || async {
                Ok("retried".to_string())
            })
            .await
            .unwrap();
        assert_eq!(entry.value, "retried");
    }

    #[tokio::test]
    async fn test_failed_compute_on_empty_slot_writes_nothing() {
        let (_clock, cache) = make_cache(t(12, 0));
        let result = cache
            .get_or_compute_ttl_based("11B10101", t(12, 0), 60, || async {
                Err(Error::Upstream("503".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(cache.get("11B10101").await, None);
    }

    #[tokio::test]
    async fn test_invalid_arguments_fail_fast() {
        let (_clock, cache) = make_cache(t(12, 0));

        let empty = cache
            .get_or_compute_ttl_based("  ", t(12, 0), 60, || async { Ok("x".to_string()) })
            .await;
        assert!(matches!(empty, Err(Error::InvalidArgument(_))));

        let negative = cache
            .get_or_compute_ttl_based("11B10101", t(12, 0), -1, || async { Ok("x".to_string()) })
            .await;
        assert!(matches!(negative, Err(Error::InvalidArgument(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let entry = CacheEntry {
            value: (),
            computed_at: t(9, 0),
            reference_time: t(9, 0),
        };
        assert!(!entry.is_stale_at(t(9, 0) + TimeDelta::days(3650), i64::MAX));
        assert!(entry.is_stale_at(t(9, 2), 1));
    }

    #[tokio::test]
    async fn test_huge_ttl_keeps_entry() {
        let (clock, cache) = make_cache(t(10, 0));
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..2 {
            let now = clock.now();
            let entry = cache
                .get_or_compute_ttl_based("11B10101", now, i64::MAX, || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok("kept".to_string())
                })
                .await
                .unwrap();
            assert_eq!(entry.value, "kept");
            clock.advance_minutes(60 * 24 * 365);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_get_waits_for_in_flight_recompute() {
        let (clock, cache) = make_cache(t(10, 0));
        let cache = Arc::new(cache);
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let now = clock.now();

        let compute = {
            let cache = Arc::clone(&cache);
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                cache
                    .get_or_compute_ttl_based("11B10101", now, 60, || async move {
                        started.notify_one();
                        release.notified().await;
                        Ok("computed".to_string())
                    })
                    .await
            })
        };

        started.notified().await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), cache.get("11B10101")).await;
        assert!(blocked.is_err());

        release.notify_one();
        compute.await.unwrap().unwrap();
        let entry = cache.get("11B10101").await.unwrap();
        assert_eq!(entry.value, "computed");
    }

    #[tokio::test]
    async fn test_get_has_no_side_effect_and_invalidate_drops_slot() {
        let (_clock, cache) = make_cache(t(12, 0));
        assert_eq!(cache.get("11B10101").await, None);
        assert!(cache.is_empty());

        cache
            .get_or_compute_ttl_based("11B10101", t(12, 0), 60, || async { Ok("x".to_string()) })
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate("11B10101"));
        assert!(!cache.invalidate("11B10101"));
        assert_eq!(cache.get("11B10101").await, None);
    }
}
