//! Herakles Process Monitor Library
//!
//! This library enumerates operating-system processes, classifies each one
//! into a semantic type and category, and keeps a time-bounded cache of the
//! classified inventory. It is framework-agnostic: the bundled binary puts a
//! CLI and an HTTP surface on top, a desktop front end can drive the same
//! [`ProcessManager`].
//!
//! # Features
//!
//! - **Two-source inventory**: running-application registry merged with the
//!   `ps` process table, deduplicated by pid
//! - **Layered classification**: ordered first-match-wins rules with graceful
//!   degradation when introspection fails
//! - **Memoized introspection**: executable paths, registry entries and
//!   service descriptors cached per pid
//! - **TTL cache**: at most one scan per cache window, off the async runtime
//!
//! # Usage
//!
//! ```no_run
//! use herakles_proc_monitor::{ManagerConfig, ProcessCategory, ProcessManager};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let manager = Arc::new(ProcessManager::new(ManagerConfig::default()));
//!
//! // First call scans, later calls inside the TTL are served from cache
//! let all = manager.get_all(false).await;
//! println!("{} processes", all.len());
//!
//! for record in manager.top_by_cpu(5).await {
//!     println!("{:>6} {:>5.1}% {}", record.pid(), record.cpu_percent, record.command);
//! }
//!
//! let apps = manager.by_category(ProcessCategory::Applications).await;
//! println!("{} applications", apps.len());
//! # }
//! ```

pub mod cache;
pub mod icons;
pub mod introspection;
pub mod inventory;
pub mod manager;
pub mod process;
pub mod runner;
pub mod system;

// Re-export main types for convenience
pub use cache::{InventoryCache, InventorySnapshot, InventoryState, SnapshotSource};
pub use icons::{CachedIconResolver, IconHandle, IconResolver};
pub use introspection::{Introspect, IntrospectionHelper, ServiceInfo};
pub use inventory::InventoryBuilder;
pub use manager::{ManagerConfig, ProcessManager, RefreshHandle};
pub use process::{
    ActivationPolicy, AppRegistry, Classification, Classifier, ClassifierConfig, EmptyRegistry,
    ProcessCategory, ProcessRecord, ProcessType, RecordSource, RunningApp, StaticRegistry,
};
pub use runner::{CommandOutput, CommandRunner, RunnerError, SystemRunner};
pub use system::SystemMemory;
