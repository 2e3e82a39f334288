//! Inventory coordinator.
//!
//! `ProcessManager` owns the inventory cache and is the single point where it
//! is mutated. Reads go through a tokio `RwLock`; scans are serialized by a
//! separate mutex so that concurrent callers within one TTL window share a
//! single scan. All subprocess work runs on the blocking pool.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{InventoryCache, InventorySnapshot, InventoryState, SnapshotSource};
use crate::icons::{spawn_prefetch, CachedIconResolver};
use crate::introspection::{
    process_details, Introspect, IntrospectionHelper, DEFAULT_PATH_TIMEOUT,
    DEFAULT_SERVICE_TIMEOUT,
};
use crate::inventory::InventoryBuilder;
use crate::process::{
    platform_registry, AppRegistry, Classifier, ClassifierConfig, ProcessCategory,
    ProcessRecord, ProcessType, DEFAULT_SCAN_TIMEOUT,
};
use crate::runner::{CommandRunner, SystemRunner};
use crate::system::{read_system_memory, SystemMemory};

const KILL_TIMEOUT: Duration = Duration::from_secs(2);

/// Runtime settings of the coordinator.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub cache_ttl: Duration,
    pub scan_timeout: Duration,
    pub service_timeout: Duration,
    pub path_timeout: Duration,
    /// Delay between a kill signal and the follow-up forced refresh.
    pub kill_refresh_delay: Duration,
    pub show_system_processes: bool,
    pub icon_prefetch_count: usize,
    pub classifier: ClassifierConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            service_timeout: DEFAULT_SERVICE_TIMEOUT,
            path_timeout: DEFAULT_PATH_TIMEOUT,
            kill_refresh_delay: Duration::from_secs(1),
            show_system_processes: true,
            icon_prefetch_count: 20,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Process-wide inventory coordinator.
pub struct ProcessManager {
    config: ManagerConfig,
    runner: Arc<dyn CommandRunner>,
    builder: Arc<InventoryBuilder>,
    icons: Arc<CachedIconResolver>,
    cache: RwLock<InventoryCache>,
    scan_lock: Mutex<()>,
    scans: AtomicU64,
    last_scan_micros: AtomicU64,
}

impl ProcessManager {
    /// Coordinator wired to the real OS tools.
    pub fn new(config: ManagerConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
        let registry = platform_registry(Arc::clone(&runner));
        let introspect = Arc::new(
            IntrospectionHelper::new(Arc::clone(&runner), Arc::clone(&registry))
                .with_timeouts(config.service_timeout, config.path_timeout),
        );
        Self::with_parts(config, runner, registry, introspect)
    }

    /// Coordinator over caller-supplied collaborators.
    pub fn with_parts(
        config: ManagerConfig,
        runner: Arc<dyn CommandRunner>,
        registry: Arc<dyn AppRegistry>,
        introspect: Arc<dyn Introspect>,
    ) -> Self {
        let builder = InventoryBuilder::new(
            Arc::clone(&runner),
            registry,
            introspect,
            Classifier::new(config.classifier.clone()),
        )
        .with_scan_timeout(config.scan_timeout);

        Self {
            config,
            runner,
            builder: Arc::new(builder),
            icons: Arc::new(CachedIconResolver::new()),
            cache: RwLock::new(InventoryCache::default()),
            scan_lock: Mutex::new(()),
            scans: AtomicU64::new(0),
            last_scan_micros: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn icons(&self) -> &Arc<CachedIconResolver> {
        &self.icons
    }

    /// Visible records, scanning only when the cache is empty, stale or
    /// `force_refresh` is set.
    pub async fn get_all(&self, force_refresh: bool) -> Vec<ProcessRecord> {
        let snapshot = self.snapshot(force_refresh).await;
        self.visible(&snapshot.records).cloned().collect()
    }

    /// Full snapshot including records hidden by `show_system_processes`.
    #[instrument(skip(self))]
    pub async fn snapshot(&self, force_refresh: bool) -> Arc<InventorySnapshot> {
        if !force_refresh {
            if let Some(snapshot) = self.cache.read().await.fresh(self.config.cache_ttl) {
                debug!("Serving inventory from cache ({} records)", snapshot.len());
                return snapshot;
            }
        }

        let _scan = self.scan_lock.lock().await;
        // Another caller may have finished a scan while we waited.
        if !force_refresh {
            if let Some(snapshot) = self.cache.read().await.fresh(self.config.cache_ttl) {
                return snapshot;
            }
        }

        let start = Instant::now();
        let builder = Arc::clone(&self.builder);
        let snapshot = match tokio::task::spawn_blocking(move || builder.build()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Inventory scan task failed: {}", e);
                return match self.cache.read().await.latest() {
                    Some(previous) => previous,
                    None => Arc::new(InventorySnapshot {
                        records: Vec::new(),
                        built_at: Utc::now(),
                        source: SnapshotSource::ForegroundOnly,
                    }),
                };
            }
        };
        let elapsed = start.elapsed();

        self.scans.fetch_add(1, Ordering::Relaxed);
        self.last_scan_micros
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);

        let snapshot = self.cache.write().await.replace(snapshot);
        debug!(
            "Inventory cache replaced in {:.2}ms",
            elapsed.as_secs_f64() * 1000.0
        );

        self.prefetch_icons(&snapshot);
        snapshot
    }

    fn prefetch_icons(&self, snapshot: &InventorySnapshot) {
        if self.config.icon_prefetch_count == 0 {
            return;
        }
        let mut busiest: Vec<ProcessRecord> = snapshot.records.clone();
        sort_by_cpu(&mut busiest);
        busiest.truncate(self.config.icon_prefetch_count);
        spawn_prefetch(Arc::clone(&self.icons), busiest);
    }

    async fn cached(&self) -> Option<Arc<InventorySnapshot>> {
        self.cache.read().await.latest()
    }

    fn visible<'a>(
        &self,
        records: &'a [ProcessRecord],
    ) -> impl Iterator<Item = &'a ProcessRecord> + 'a {
        let show_system = self.config.show_system_processes;
        records
            .iter()
            .filter(move |r| show_system || !r.process_type().is_system())
    }

    async fn query<F>(&self, keep: F) -> Vec<ProcessRecord>
    where
        F: Fn(&ProcessRecord) -> bool,
    {
        match self.cached().await {
            Some(snapshot) => self
                .visible(&snapshot.records)
                .filter(|r| keep(r))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Top `n` cached records by CPU usage. Never scans.
    pub async fn top_by_cpu(&self, n: usize) -> Vec<ProcessRecord> {
        let mut records = self.query(|_| true).await;
        sort_by_cpu(&mut records);
        records.truncate(n);
        records
    }

    /// Top `n` cached records by memory usage. Never scans.
    pub async fn top_by_memory(&self, n: usize) -> Vec<ProcessRecord> {
        let mut records = self.query(|_| true).await;
        records.sort_by(|a, b| {
            b.memory_percent
                .partial_cmp(&a.memory_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pid().cmp(&b.pid()))
        });
        records.truncate(n);
        records
    }

    pub async fn by_category(&self, category: ProcessCategory) -> Vec<ProcessRecord> {
        self.query(|r| r.category() == category).await
    }

    pub async fn by_type(&self, process_type: ProcessType) -> Vec<ProcessRecord> {
        self.query(|r| r.process_type() == process_type).await
    }

    /// Reporting view: every record whose type is a member of `category`,
    /// so `Daemons` also lists system daemons.
    pub async fn by_type_group(&self, category: ProcessCategory) -> Vec<ProcessRecord> {
        let members = category.member_types();
        self.query(|r| members.contains(&r.process_type())).await
    }

    /// Sends SIGTERM. True iff `kill` exited with status zero.
    pub async fn kill_process(self: &Arc<Self>, pid: u32) -> bool {
        self.signal(pid, "-TERM").await
    }

    /// Sends SIGKILL. True iff `kill` exited with status zero.
    pub async fn force_kill_process(self: &Arc<Self>, pid: u32) -> bool {
        self.signal(pid, "-KILL").await
    }

    async fn signal(self: &Arc<Self>, pid: u32, signal: &'static str) -> bool {
        let runner = Arc::clone(&self.runner);
        let delivered = tokio::task::spawn_blocking(move || {
            let pid_arg = pid.to_string();
            match runner.run("kill", &[signal, &pid_arg], KILL_TIMEOUT) {
                Ok(out) => out.success(),
                Err(e) => {
                    warn!(pid, signal, error = %e, "kill could not be run");
                    false
                }
            }
        })
        .await
        .unwrap_or(false);

        if delivered {
            info!(pid, signal, "signal delivered");
        } else {
            warn!(pid, signal, "signal not delivered");
        }

        self.schedule_refresh();
        delivered
    }

    fn schedule_refresh(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let delay = self.config.kill_refresh_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.snapshot(true).await;
        });
    }

    /// Cached record for `pid` enriched with parent pid, owning user and
    /// start time.
    pub async fn inspect(&self, pid: u32) -> Option<ProcessRecord> {
        let snapshot = match self.cached().await {
            Some(snapshot) => snapshot,
            None => self.snapshot(false).await,
        };
        let record = snapshot.get(pid)?.clone();

        let runner = Arc::clone(&self.runner);
        let details = tokio::task::spawn_blocking(move || process_details(runner.as_ref(), pid))
            .await
            .unwrap_or_default();
        Some(record.with_details(&details))
    }

    /// Aggregate memory totals from the OS accounting counters.
    pub async fn system_info(&self) -> Result<SystemMemory, String> {
        let runner = Arc::clone(&self.runner);
        tokio::task::spawn_blocking(move || read_system_memory(runner.as_ref()))
            .await
            .map_err(|e| format!("System memory task failed: {}", e))?
    }

    pub async fn state(&self) -> InventoryState {
        self.cache.read().await.state()
    }

    pub async fn cache_age(&self) -> Option<Duration> {
        self.cache.read().await.age()
    }

    /// Number of scans performed so far.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn last_scan_duration(&self) -> Duration {
        Duration::from_micros(self.last_scan_micros.load(Ordering::Relaxed))
    }

    /// Force-refreshes every `interval` and hands the visible records to
    /// `on_refresh`. The task runs until the returned handle is stopped or
    /// dropped.
    pub fn start_auto_refresh<F>(self: &Arc<Self>, interval: Duration, on_refresh: F) -> RefreshHandle
    where
        F: Fn(&[ProcessRecord]) + Send + Sync + 'static,
    {
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let records = manager.get_all(true).await;
                on_refresh(&records);
            }
        });
        info!("Auto refresh started (interval {:?})", interval);
        RefreshHandle { task }
    }
}

fn sort_by_cpu(records: &mut [ProcessRecord]) {
    records.sort_by(|a, b| {
        b.cpu_percent
            .partial_cmp(&a.cpu_percent)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.pid().cmp(&b.pid()))
    });
}

/// Handle of a periodic refresh task; stopping or dropping it cancels the task.
pub struct RefreshHandle {
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
