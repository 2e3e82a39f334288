//! Prometheus metrics definitions for herakles-proc-monitor.
//!
//! Scan telemetry only: inventory size per category, scan timing, cache age
//! and system memory. No per-process series are exported.

use herakles_proc_monitor::{InventoryState, ProcessCategory, ProcessRecord, SystemMemory};
use prometheus::{Counter, Gauge, GaugeVec, Opts, Registry};
use std::time::Duration;

/// Collection of Prometheus metrics for the monitor.
#[derive(Clone)]
pub struct MonitorMetrics {
    pub processes: GaugeVec, // labels: category
    pub scan_duration_seconds: Gauge,
    pub scans_total: Counter,
    pub cache_age_seconds: Gauge,
    pub inventory_degraded: Gauge,
    pub system_memory_total_bytes: Gauge,
    pub system_memory_used_ratio: Gauge,
}

impl MonitorMetrics {
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let processes = GaugeVec::new(
            Opts::new(
                "herakles_proc_monitor_processes",
                "Number of processes in the current inventory per category",
            ),
            &["category"],
        )?;
        let scan_duration_seconds = Gauge::new(
            "herakles_proc_monitor_scan_duration_seconds",
            "Duration of the last full inventory scan",
        )?;
        let scans_total = Counter::new(
            "herakles_proc_monitor_scans_total",
            "Number of inventory scans performed",
        )?;
        let cache_age_seconds = Gauge::new(
            "herakles_proc_monitor_cache_age_seconds",
            "Age of the cached inventory snapshot",
        )?;
        let inventory_degraded = Gauge::new(
            "herakles_proc_monitor_inventory_degraded",
            "Whether the last snapshot came from the registry-only fallback (1) or a full scan (0)",
        )?;
        let system_memory_total_bytes = Gauge::new(
            "herakles_proc_monitor_system_memory_total_bytes",
            "Total physical memory",
        )?;
        let system_memory_used_ratio = Gauge::new(
            "herakles_proc_monitor_system_memory_used_ratio",
            "Used physical memory ratio (0.0-1.0)",
        )?;

        registry.register(Box::new(processes.clone()))?;
        registry.register(Box::new(scan_duration_seconds.clone()))?;
        registry.register(Box::new(scans_total.clone()))?;
        registry.register(Box::new(cache_age_seconds.clone()))?;
        registry.register(Box::new(inventory_degraded.clone()))?;
        registry.register(Box::new(system_memory_total_bytes.clone()))?;
        registry.register(Box::new(system_memory_used_ratio.clone()))?;

        Ok(Self {
            processes,
            scan_duration_seconds,
            scans_total,
            cache_age_seconds,
            inventory_degraded,
            system_memory_total_bytes,
            system_memory_used_ratio,
        })
    }

    /// Sets the per-category gauges from a record list.
    pub fn observe_inventory(&self, records: &[ProcessRecord]) {
        self.processes.reset();
        for category in ProcessCategory::ALL {
            let count = records.iter().filter(|r| r.category() == category).count();
            self.processes
                .with_label_values(&[category.as_str()])
                .set(count as f64);
        }
    }

    /// Records scan telemetry; `scan_count` is the manager's running total.
    pub fn observe_scans(
        &self,
        scan_count: u64,
        last_scan: Duration,
        cache_age: Option<Duration>,
        state: InventoryState,
    ) {
        let seen = self.scans_total.get() as u64;
        if scan_count > seen {
            self.scans_total.inc_by((scan_count - seen) as f64);
        }
        self.scan_duration_seconds.set(last_scan.as_secs_f64());
        self.cache_age_seconds
            .set(cache_age.map(|a| a.as_secs_f64()).unwrap_or(0.0));
        self.inventory_degraded.set(if state == InventoryState::Degraded {
            1.0
        } else {
            0.0
        });
    }

    pub fn observe_memory(&self, memory: &SystemMemory) {
        self.system_memory_total_bytes.set(memory.total_bytes as f64);
        self.system_memory_used_ratio.set(memory.used_percent / 100.0);
    }
}
