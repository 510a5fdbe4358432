//! Collaborator interfaces consumed by the engine, with in-memory
//! implementations used by tests and fixture-driven runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{Error, Result, Snapshot, SnapshotKind, WarningMap, WarningState};
use tokio::sync::RwLock;

use crate::types::AlertEvent;

/// Source of forecast snapshots. `Ok(None)` means upstream has nothing for
/// the region, which is not an error.
#[async_trait]
pub trait SnapshotPort: Send + Sync {
    async fn fetch(&self, region_id: &str, kind: SnapshotKind) -> Result<Option<Snapshot>>;
}

/// Source of the latest warning state per kind.
#[async_trait]
pub trait WarningPort: Send + Sync {
    async fn fetch(&self, region_id: &str) -> Result<WarningMap>;
}

/// Push delivery. Returns an opaque message id on success.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn dispatch(&self, event: &AlertEvent) -> Result<String>;
}

// ── In-memory snapshots ───────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemorySnapshotPort {
    snapshots: RwLock<HashMap<(String, SnapshotKind), Snapshot>>,
    failing: RwLock<HashSet<String>>,
    fetches: AtomicUsize,
}

impl InMemorySnapshotPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored under the snapshot's own region and kind.
    pub async fn insert(&self, snapshot: Snapshot) {
        let key = (snapshot.region_id.clone(), snapshot.kind);
        self.snapshots.write().await.insert(key, snapshot);
    }

    pub async fn remove(&self, region_id: &str, kind: SnapshotKind) -> Option<Snapshot> {
        self.snapshots
            .write()
            .await
            .remove(&(region_id.to_string(), kind))
    }

    /// Make every fetch for `region_id` fail until `recover_region`.
    pub async fn fail_region(&self, region_id: &str) {
        self.failing.write().await.insert(region_id.to_string());
    }

    pub async fn recover_region(&self, region_id: &str) {
        self.failing.write().await.remove(region_id);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotPort for InMemorySnapshotPort {
    async fn fetch(&self, region_id: &str, kind: SnapshotKind) -> Result<Option<Snapshot>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.read().await.contains(region_id) {
            return Err(Error::Upstream(format!(
                "snapshot fetch failed for {region_id} ({kind})"
            )));
        }
        Ok(self
            .snapshots
            .read()
            .await
            .get(&(region_id.to_string(), kind))
            .cloned())
    }
}

// ── In-memory warnings ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryWarningPort {
    warnings: RwLock<HashMap<String, WarningMap>>,
    failing: RwLock<HashSet<String>>,
    fetches: AtomicUsize,
}

impl InMemoryWarningPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the region's previous state for the same kind.
    pub async fn insert(&self, state: WarningState) {
        self.warnings
            .write()
            .await
            .entry(state.region_id.clone())
            .or_default()
            .insert(state.kind, state);
    }

    pub async fn fail_region(&self, region_id: &str) {
        self.failing.write().await.insert(region_id.to_string());
    }

    pub async fn recover_region(&self, region_id: &str) {
        self.failing.write().await.remove(region_id);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WarningPort for InMemoryWarningPort {
    async fn fetch(&self, region_id: &str) -> Result<WarningMap> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.read().await.contains(region_id) {
            return Err(Error::Upstream(format!(
                "warning fetch failed for {region_id}"
            )));
        }
        Ok(self
            .warnings
            .read()
            .await
            .get(region_id)
            .cloned()
            .unwrap_or_default())
    }
}
