//! Process record and the closed classification taxonomy.
//!
//! `ProcessType` is the result of classification; `ProcessCategory` is a pure
//! many-to-one grouping over it. Both carry a fixed priority used only for the
//! default snapshot ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Classification assigned to every process, exactly one per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    UserApplication,
    SystemApplication,
    BackgroundTask,
    SystemDaemon,
    UserDaemon,
    Kernel,
    Unknown,
}

impl ProcessType {
    /// All variants in display-priority order.
    pub const ALL: [ProcessType; 7] = [
        ProcessType::UserApplication,
        ProcessType::SystemApplication,
        ProcessType::BackgroundTask,
        ProcessType::UserDaemon,
        ProcessType::SystemDaemon,
        ProcessType::Unknown,
        ProcessType::Kernel,
    ];

    /// Derives the category. Pure lookup, never reclassifies.
    pub fn category(self) -> ProcessCategory {
        match self {
            ProcessType::UserApplication | ProcessType::SystemApplication => {
                ProcessCategory::Applications
            }
            ProcessType::SystemDaemon => ProcessCategory::SystemServices,
            ProcessType::BackgroundTask => ProcessCategory::BackgroundProcesses,
            ProcessType::UserDaemon => ProcessCategory::Daemons,
            ProcessType::Kernel => ProcessCategory::KernelProcesses,
            ProcessType::Unknown => ProcessCategory::BackgroundProcesses,
        }
    }

    /// Sort priority, lower sorts first.
    pub fn priority(self) -> u8 {
        match self {
            ProcessType::UserApplication => 0,
            ProcessType::SystemApplication => 1,
            ProcessType::BackgroundTask => 2,
            ProcessType::UserDaemon => 3,
            ProcessType::SystemDaemon => 4,
            ProcessType::Unknown => 5,
            ProcessType::Kernel => 6,
        }
    }

    /// Symbol name used when no bundle icon is available.
    pub fn icon_name(self) -> &'static str {
        match self {
            ProcessType::UserApplication => "app.fill",
            ProcessType::SystemApplication => "macwindow",
            ProcessType::BackgroundTask => "gearshape",
            ProcessType::SystemDaemon => "gearshape.2",
            ProcessType::UserDaemon => "person.crop.circle.badge.clock",
            ProcessType::Kernel => "cpu",
            ProcessType::Unknown => "questionmark.circle",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProcessType::UserApplication => "User Application",
            ProcessType::SystemApplication => "System Application",
            ProcessType::BackgroundTask => "Background Task",
            ProcessType::SystemDaemon => "System Daemon",
            ProcessType::UserDaemon => "User Daemon",
            ProcessType::Kernel => "Kernel",
            ProcessType::Unknown => "Unknown",
        }
    }

    /// Processes hidden when the "show system processes" preference is off.
    pub fn is_system(self) -> bool {
        matches!(self, ProcessType::SystemDaemon | ProcessType::Kernel)
    }

    /// Parses the snake_case name used in config files and query strings.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessType::UserApplication => "user_application",
            ProcessType::SystemApplication => "system_application",
            ProcessType::BackgroundTask => "background_task",
            ProcessType::SystemDaemon => "system_daemon",
            ProcessType::UserDaemon => "user_daemon",
            ProcessType::Kernel => "kernel",
            ProcessType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Reporting group over `ProcessType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessCategory {
    Applications,
    BackgroundProcesses,
    SystemServices,
    Daemons,
    KernelProcesses,
}

impl ProcessCategory {
    pub const ALL: [ProcessCategory; 5] = [
        ProcessCategory::Applications,
        ProcessCategory::BackgroundProcesses,
        ProcessCategory::SystemServices,
        ProcessCategory::Daemons,
        ProcessCategory::KernelProcesses,
    ];

    pub fn priority(self) -> u8 {
        match self {
            ProcessCategory::Applications => 0,
            ProcessCategory::BackgroundProcesses => 1,
            ProcessCategory::SystemServices => 2,
            ProcessCategory::Daemons => 3,
            ProcessCategory::KernelProcesses => 4,
        }
    }

    /// Types listed under this category in the "by type-group" view.
    ///
    /// Unlike [`ProcessType::category`] this is not a partition: `Daemons`
    /// lists both user and system daemons.
    pub fn member_types(self) -> &'static [ProcessType] {
        match self {
            ProcessCategory::Applications => {
                &[ProcessType::UserApplication, ProcessType::SystemApplication]
            }
            ProcessCategory::BackgroundProcesses => {
                &[ProcessType::BackgroundTask, ProcessType::Unknown]
            }
            ProcessCategory::SystemServices => &[ProcessType::SystemDaemon],
            ProcessCategory::Daemons => &[ProcessType::UserDaemon, ProcessType::SystemDaemon],
            ProcessCategory::KernelProcesses => &[ProcessType::Kernel],
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProcessCategory::Applications => "Applications",
            ProcessCategory::BackgroundProcesses => "Background Processes",
            ProcessCategory::SystemServices => "System Services",
            ProcessCategory::Daemons => "Daemons",
            ProcessCategory::KernelProcesses => "Kernel Processes",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessCategory::Applications => "applications",
            ProcessCategory::BackgroundProcesses => "background_processes",
            ProcessCategory::SystemServices => "system_services",
            ProcessCategory::Daemons => "daemons",
            ProcessCategory::KernelProcesses => "kernel_processes",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for ProcessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which snapshot source produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Registry,
    ProcessTable,
    Placeholder,
}

/// Derived, immutable classification metadata of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub process_type: ProcessType,
    pub category: ProcessCategory,
    pub is_application: bool,
    pub bundle_identifier: Option<String>,
}

/// One process in an inventory snapshot.
///
/// Derived fields are private and fixed at construction; refreshing metrics
/// goes through [`ProcessRecord::with_metrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pid: u32,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub command: String,
    pub executable_path: String,
    pub source: RecordSource,
    #[serde(flatten)]
    classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owning_user: Option<String>,
}

impl ProcessRecord {
    /// Full construction from already-derived classification.
    pub fn new(
        pid: u32,
        command: impl Into<String>,
        executable_path: impl Into<String>,
        cpu_percent: f64,
        memory_percent: f64,
        source: RecordSource,
        classification: Classification,
    ) -> Self {
        Self {
            pid,
            cpu_percent: cpu_percent.max(0.0),
            memory_percent: memory_percent.max(0.0),
            command: command.into(),
            executable_path: executable_path.into(),
            source,
            classification,
            start_time: None,
            parent_pid: None,
            owning_user: None,
        }
    }

    /// Rebuilds the record with fresh metrics, keeping every derived field.
    pub fn with_metrics(&self, cpu_percent: f64, memory_percent: f64) -> Self {
        Self {
            cpu_percent: cpu_percent.max(0.0),
            memory_percent: memory_percent.max(0.0),
            ..self.clone()
        }
    }

    /// Enhanced construction path carrying the optional process details.
    pub fn with_details(&self, details: &ProcessDetails) -> Self {
        Self {
            start_time: details.start_time,
            parent_pid: details.parent_pid,
            owning_user: details.owning_user.clone(),
            ..self.clone()
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn process_type(&self) -> ProcessType {
        self.classification.process_type
    }

    pub fn category(&self) -> ProcessCategory {
        self.classification.category
    }

    pub fn is_application(&self) -> bool {
        self.classification.is_application
    }

    pub fn bundle_identifier(&self) -> Option<&str> {
        self.classification.bundle_identifier.as_deref()
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Default snapshot ordering: category priority, type priority, cpu descending.
    pub fn display_order(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
        a.category()
            .priority()
            .cmp(&b.category().priority())
            .then_with(|| a.process_type().priority().cmp(&b.process_type().priority()))
            .then_with(|| {
                b.cpu_percent
                    .partial_cmp(&a.cpu_percent)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.pid.cmp(&b.pid))
    }
}

/// Optional per-process details for the enhanced construction path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessDetails {
    pub start_time: Option<DateTime<Utc>>,
    pub parent_pid: Option<u32>,
    pub owning_user: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pid: u32, process_type: ProcessType, cpu: f64) -> ProcessRecord {
        ProcessRecord::new(
            pid,
            "proc",
            "/usr/bin/proc",
            cpu,
            1.0,
            RecordSource::ProcessTable,
            Classification {
                process_type,
                category: process_type.category(),
                is_application: false,
                bundle_identifier: None,
            },
        )
    }

    #[test]
    fn test_category_derivation() {
        assert_eq!(
            ProcessType::UserApplication.category(),
            ProcessCategory::Applications
        );
        assert_eq!(
            ProcessType::SystemApplication.category(),
            ProcessCategory::Applications
        );
        assert_eq!(
            ProcessType::SystemDaemon.category(),
            ProcessCategory::SystemServices
        );
        assert_eq!(ProcessType::UserDaemon.category(), ProcessCategory::Daemons);
        assert_eq!(
            ProcessType::Unknown.category(),
            ProcessCategory::BackgroundProcesses
        );
        assert_eq!(
            ProcessType::Kernel.category(),
            ProcessCategory::KernelProcesses
        );
    }

    #[test]
    fn test_daemons_view_lists_both_daemon_types() {
        let members = ProcessCategory::Daemons.member_types();
        assert!(members.contains(&ProcessType::UserDaemon));
        assert!(members.contains(&ProcessType::SystemDaemon));
    }

    #[test]
    fn test_with_metrics_preserves_derived_fields() {
        let mut original = record(42, ProcessType::UserApplication, 12.0);
        original.classification.is_application = true;
        original.classification.bundle_identifier = Some("com.example.app".into());

        let refreshed = original.with_metrics(55.5, 3.25);

        assert_eq!(refreshed.classification(), original.classification());
        assert_eq!(refreshed.pid(), 42);
        assert_eq!(refreshed.command, original.command);
        assert_eq!(refreshed.executable_path, original.executable_path);
        assert_eq!(refreshed.cpu_percent, 55.5);
        assert_eq!(refreshed.memory_percent, 3.25);
    }

    #[test]
    fn test_negative_metrics_are_clamped() {
        let r = record(1, ProcessType::Unknown, -4.0);
        assert_eq!(r.cpu_percent, 0.0);
    }

    #[test]
    fn test_display_order() {
        let mut records = vec![
            record(1, ProcessType::Kernel, 90.0),
            record(2, ProcessType::SystemDaemon, 10.0),
            record(3, ProcessType::UserApplication, 1.0),
            record(4, ProcessType::UserApplication, 30.0),
            record(5, ProcessType::SystemApplication, 50.0),
        ];
        records.sort_by(ProcessRecord::display_order);
        let pids: Vec<u32> = records.iter().map(|r| r.pid()).collect();
        assert_eq!(pids, vec![4, 3, 5, 2, 1]);
    }

    #[test]
    fn test_names_round_trip_through_query_strings() {
        for t in ProcessType::ALL {
            assert_eq!(ProcessType::from_name(t.as_str()), Some(t));
        }
        for c in ProcessCategory::ALL {
            assert_eq!(ProcessCategory::from_name(c.as_str()), Some(c));
        }
        assert_eq!(ProcessType::from_name("nope"), None);
    }
}
