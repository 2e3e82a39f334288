//! Process discovery and classification.
//!
//! This module provides:
//! - `types`: Process records and the type/category taxonomy
//! - `scanner`: Process-table scanning through `ps`
//! - `apps`: Running-application registry
//! - `bundle`: Application bundle helpers
//! - `classifier`: Ordered classification rules

pub mod apps;
pub mod bundle;
pub mod classifier;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use apps::{
    platform_registry, ActivationPolicy, AppRegistry, EmptyRegistry, LsappinfoRegistry,
    RunningApp, StaticRegistry,
};
pub use classifier::{Classifier, ClassifierConfig};
pub use scanner::{parse_table, ScanError, TableRow, TableScanner, DEFAULT_SCAN_TIMEOUT};
pub use types::{
    Classification, ProcessCategory, ProcessDetails, ProcessRecord, ProcessType, RecordSource,
};
