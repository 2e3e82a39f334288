//! Inventory builder: merges the two snapshot sources into one classified list.
//!
//! The registry is read first and wins for every pid it knows; the process
//! table contributes every other pid. When the table scan fails the snapshot
//! degrades to the registry plus the always-present system pseudo-processes.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use chrono::Utc;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::cache::{InventorySnapshot, SnapshotSource};
use crate::introspection::Introspect;
use crate::process::{
    AppRegistry, Classifier, ProcessRecord, RecordSource, RunningApp, TableRow, TableScanner,
    DEFAULT_SCAN_TIMEOUT,
};
use crate::runner::CommandRunner;

/// Pseudo-processes present on every system, used when the table scan fails.
#[cfg(target_os = "macos")]
const PLACEHOLDERS: [(u32, &str, &str); 2] =
    [(0, "kernel_task", "kernel_task"), (1, "launchd", "/sbin/launchd")];
#[cfg(not(target_os = "macos"))]
const PLACEHOLDERS: [(u32, &str, &str); 2] =
    [(0, "kernel", "kernel"), (1, "init", "/sbin/init")];

/// Builds inventory snapshots.
pub struct InventoryBuilder {
    runner: Arc<dyn CommandRunner>,
    registry: Arc<dyn AppRegistry>,
    introspect: Arc<dyn Introspect>,
    classifier: Classifier,
    scan_timeout: Duration,
}

impl InventoryBuilder {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        registry: Arc<dyn AppRegistry>,
        introspect: Arc<dyn Introspect>,
        classifier: Classifier,
    ) -> Self {
        Self {
            runner,
            registry,
            introspect,
            classifier,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Performs one full scan. Never fails; degraded sources yield a smaller snapshot.
    #[instrument(skip(self))]
    pub fn build(&self) -> InventorySnapshot {
        let start = Instant::now();

        let apps = self.registry.list();
        let mut covered: HashSet<u32> = HashSet::with_capacity(apps.len());
        let apps: Vec<RunningApp> = apps.into_iter().filter(|a| covered.insert(a.pid)).collect();
        for app in &apps {
            self.introspect.record_application(app);
        }
        debug!("Registry reported {} applications", apps.len());

        let scanner = TableScanner::new(self.runner.as_ref(), self.scan_timeout);
        let (mut records, source) = match scanner.scan() {
            Ok(rows) => {
                let metrics: HashMap<u32, (f64, f64)> = rows
                    .iter()
                    .map(|r| (r.pid, (r.cpu_percent, r.memory_percent)))
                    .collect();

                let mut records: Vec<ProcessRecord> = apps
                    .par_iter()
                    .map(|app| self.app_record(app, metrics.get(&app.pid).copied()))
                    .collect();

                let mut seen = covered.clone();
                let remaining: Vec<&TableRow> =
                    rows.iter().filter(|r| seen.insert(r.pid)).collect();
                records.par_extend(remaining.par_iter().map(|row| self.table_record(row)));

                (records, SnapshotSource::Full)
            }
            Err(e) => {
                warn!("Process table unavailable, falling back to registry only: {}", e);
                let mut records: Vec<ProcessRecord> = apps
                    .par_iter()
                    .map(|app| self.app_record(app, None))
                    .collect();
                for (pid, command, path) in PLACEHOLDERS {
                    if !covered.contains(&pid) {
                        records.push(self.record(pid, command, path, 0.0, 0.0, RecordSource::Placeholder));
                    }
                }
                (records, SnapshotSource::ForegroundOnly)
            }
        };

        records.sort_by(ProcessRecord::display_order);

        info!(
            "Inventory built: {} processes ({} from registry, {:?}) in {:.2}ms",
            records.len(),
            apps.len(),
            source,
            start.elapsed().as_secs_f64() * 1000.0
        );

        InventorySnapshot {
            records,
            built_at: Utc::now(),
            source,
        }
    }

    fn app_record(&self, app: &RunningApp, metrics: Option<(f64, f64)>) -> ProcessRecord {
        let path = app
            .executable_path
            .clone()
            .or_else(|| self.introspect.executable_path(app.pid))
            .unwrap_or_else(|| app.name.clone());
        let (cpu, mem) = metrics.unwrap_or((0.0, 0.0));
        self.record(app.pid, &app.name, &path, cpu, mem, RecordSource::Registry)
    }

    fn table_record(&self, row: &TableRow) -> ProcessRecord {
        let command = short_name(&row.command);
        let path = self
            .introspect
            .executable_path(row.pid)
            .unwrap_or_else(|| row.command.clone());
        self.record(
            row.pid,
            command,
            &path,
            row.cpu_percent,
            row.memory_percent,
            RecordSource::ProcessTable,
        )
    }

    fn record(
        &self,
        pid: u32,
        command: &str,
        path: &str,
        cpu: f64,
        mem: f64,
        source: RecordSource,
    ) -> ProcessRecord {
        let classification =
            self.classifier
                .derive(command, path, pid, self.introspect.as_ref(), self.runner.as_ref());
        ProcessRecord::new(pid, command, path, cpu, mem, source, classification)
    }
}

/// `ps` reports a full path as the command on some systems; keep the file name.
fn short_name(command: &str) -> &str {
    if command.starts_with('/') {
        Path::new(command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(command)
    } else {
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("/usr/sbin/syslogd"), "syslogd");
        assert_eq!(short_name("launchd"), "launchd");
        assert_eq!(
            short_name("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            "Google Chrome"
        );
    }
}
