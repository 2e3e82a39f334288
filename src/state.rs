//! Application state management for serve mode.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use herakles_proc_monitor::ProcessManager;
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::metrics::MonitorMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub manager: Arc<ProcessManager>,
    pub registry: Registry,
    pub metrics: MonitorMetrics,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
