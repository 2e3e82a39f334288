//! CLI command implementations for herakles-proc-monitor.
//!
//! This module provides implementations for all CLI subcommands:
//! - `list` / `top`: Inventory listings
//! - `kill`: Process termination
//! - `inspect` / `system`: Single-process details and memory totals
//! - `watch`: Periodic refresh
//! - `check`: System validation
//! - `config`: Configuration file generation

pub mod check;
pub mod config;
pub mod inspect;
pub mod kill;
pub mod list;
pub mod output;
pub mod watch;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use inspect::{command_inspect, command_system};
pub use kill::command_kill;
pub use list::{command_list, command_top};
pub use watch::command_watch;
