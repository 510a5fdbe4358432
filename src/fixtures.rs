//! File-backed collaborators for fixture-driven runs.
//!
//! Layout: `<dir>/<region>/current.json`, `previous.json`, `warnings.json`.
//! A missing file means upstream has nothing for the region.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use alert_engine::{AlertDispatcher, AlertEvent, SnapshotPort, WarningPort};
use async_trait::async_trait;
use common::wire::{decode_snapshot, decode_warnings};
use common::{Error, Result, Snapshot, SnapshotKind, WarningMap};
use tracing::{debug, info};
use uuid::Uuid;

fn region_dir(root: &Path, region_id: &str) -> Result<PathBuf> {
    if region_id.is_empty()
        || region_id.contains(['/', '\\'])
        || region_id == "."
        || region_id == ".."
    {
        return Err(Error::InvalidArgument(format!(
            "region id {region_id:?} is not a valid fixture directory name"
        )));
    }
    Ok(root.join(region_id))
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "fixture file missing");
            Ok(None)
        }
        Err(e) => Err(Error::Upstream(format!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

fn snapshot_file(kind: SnapshotKind) -> &'static str {
    match kind {
        SnapshotKind::Current => "current.json",
        SnapshotKind::Previous => "previous.json",
    }
}

#[derive(Debug, Clone)]
pub struct FixtureSnapshotPort {
    root: PathBuf,
}

impl FixtureSnapshotPort {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SnapshotPort for FixtureSnapshotPort {
    async fn fetch(&self, region_id: &str, kind: SnapshotKind) -> Result<Option<Snapshot>> {
        let path = region_dir(&self.root, region_id)?.join(snapshot_file(kind));
        let Some(contents) = read_optional(&path).await? else {
            return Ok(None);
        };
        let snapshot = decode_snapshot(&contents, kind)?;
        if snapshot.region_id != region_id {
            return Err(Error::Upstream(format!(
                "{} holds region {}, expected {}",
                path.display(),
                snapshot.region_id,
                region_id
            )));
        }
        Ok(Some(snapshot))
    }
}

#[derive(Debug, Clone)]
pub struct FixtureWarningPort {
    root: PathBuf,
}

impl FixtureWarningPort {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl WarningPort for FixtureWarningPort {
    async fn fetch(&self, region_id: &str) -> Result<WarningMap> {
        let path = region_dir(&self.root, region_id)?.join("warnings.json");
        match read_optional(&path).await? {
            Some(contents) => decode_warnings(&contents),
            None => Ok(WarningMap::new()),
        }
    }
}

/// Dispatcher that writes each event to the log and assigns a fresh id.
#[derive(Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn dispatch(&self, event: &AlertEvent) -> Result<String> {
        let body = serde_json::to_string(event)?;
        let message_id = Uuid::new_v4().to_string();
        info!(message_id = %message_id, "PUSH {}", body);
        Ok(message_id)
    }
}
