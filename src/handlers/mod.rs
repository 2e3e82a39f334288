//! HTTP endpoint handlers for serve mode.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/processes*`: Inventory queries and termination
//! - `/system`: System memory totals
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Health check endpoint
//! - `/`: Endpoint listing

pub mod health;
pub mod metrics;
pub mod processes;
pub mod root;
pub mod system;

// Re-export handlers
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use processes::{kill_handler, list_handler, process_handler, top_handler};
pub use root::root_handler;
pub use system::system_handler;
