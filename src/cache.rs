//! Inventory cache.
//!
//! This module provides the `InventoryCache` holding the last classified
//! snapshot together with the instant it was built.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::process::ProcessRecord;

/// Where the records of a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    /// Registry merged with a successful process-table scan.
    Full,
    /// Process-table scan failed; registry entries plus fixed placeholders.
    ForegroundOnly,
}

/// Loading marker for consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryState {
    /// No scan has completed yet.
    Loading,
    /// Last snapshot came from a full scan.
    Ready,
    /// Last snapshot came from the fallback path.
    Degraded,
}

/// One complete, ordered, classified enumeration of processes.
#[derive(Debug, Clone, Serialize)]
pub struct InventorySnapshot {
    pub records: Vec<ProcessRecord>,
    pub built_at: DateTime<Utc>,
    pub source: SnapshotSource,
}

impl InventorySnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.records.iter().find(|r| r.pid() == pid)
    }
}

/// Cache states: `Empty -> Populated -> Stale(after ttl) -> Populated`.
#[derive(Debug, Clone, Default)]
pub struct InventoryCache {
    snapshot: Option<Arc<InventorySnapshot>>,
    built: Option<Instant>,
}

impl InventoryCache {
    /// Snapshot if populated and younger than `ttl`.
    pub fn fresh(&self, ttl: Duration) -> Option<Arc<InventorySnapshot>> {
        match (&self.snapshot, self.built) {
            (Some(snapshot), Some(built)) if built.elapsed() < ttl => Some(Arc::clone(snapshot)),
            _ => None,
        }
    }

    /// Last snapshot regardless of age.
    pub fn latest(&self) -> Option<Arc<InventorySnapshot>> {
        self.snapshot.clone()
    }

    pub fn age(&self) -> Option<Duration> {
        self.built.map(|b| b.elapsed())
    }

    pub fn replace(&mut self, snapshot: InventorySnapshot) -> Arc<InventorySnapshot> {
        let snapshot = Arc::new(snapshot);
        self.snapshot = Some(Arc::clone(&snapshot));
        self.built = Some(Instant::now());
        snapshot
    }

    pub fn state(&self) -> InventoryState {
        match &self.snapshot {
            None => InventoryState::Loading,
            Some(s) if s.source == SnapshotSource::ForegroundOnly => InventoryState::Degraded,
            Some(_) => InventoryState::Ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(source: SnapshotSource) -> InventorySnapshot {
        InventorySnapshot {
            records: Vec::new(),
            built_at: Utc::now(),
            source,
        }
    }

    #[test]
    fn test_empty_cache_is_loading_and_never_fresh() {
        let cache = InventoryCache::default();
        assert_eq!(cache.state(), InventoryState::Loading);
        assert!(cache.fresh(Duration::from_secs(60)).is_none());
        assert!(cache.age().is_none());
    }

    #[test]
    fn test_populated_then_stale() {
        let mut cache = InventoryCache::default();
        cache.replace(snapshot(SnapshotSource::Full));
        assert!(cache.fresh(Duration::from_secs(60)).is_some());
        assert!(cache.fresh(Duration::ZERO).is_none());
        assert!(cache.latest().is_some());
        assert_eq!(cache.state(), InventoryState::Ready);
    }

    #[test]
    fn test_degraded_state() {
        let mut cache = InventoryCache::default();
        cache.replace(snapshot(SnapshotSource::ForegroundOnly));
        assert_eq!(cache.state(), InventoryState::Degraded);
    }
}
