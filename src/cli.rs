//! CLI arguments and subcommands for herakles-proc-monitor.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for process listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Sort key for `top`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    Cpu,
    Memory,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-proc-monitor",
    about = "Process inventory and classification monitor",
    long_about = "Process inventory and classification monitor.\n\n\
                  Enumerates running processes, classifies them into applications, \
                  background tasks, services, daemons and kernel processes, and keeps a \
                  short-lived cache of the result. Runs as a one-shot CLI or as a small \
                  HTTP service.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port (serve mode)
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP (serve mode)
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Cache inventory for N seconds
    #[arg(long)]
    pub cache_ttl: Option<u64>,

    /// Timeout for the process-table scan in milliseconds
    #[arg(long)]
    pub scan_timeout_ms: Option<u64>,

    /// Hide system daemons and kernel processes
    #[arg(long)]
    pub hide_system: bool,

    /// Parallel classification threads (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the classified process inventory
    List {
        /// Only this category (applications, background_processes, system_services, daemons, kernel_processes)
        #[arg(long)]
        category: Option<String>,

        /// Only this process type (user_application, system_daemon, ...)
        #[arg(long = "type")]
        process_type: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the busiest processes
    Top {
        /// Number of processes
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Sort key
        #[arg(long, value_enum, default_value = "cpu")]
        by: SortKey,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Terminate a process
    Kill {
        /// Process id
        pid: u32,

        /// Send SIGKILL instead of SIGTERM
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Show one process with parent, owner and start time
    Inspect {
        /// Process id
        pid: u32,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show system memory totals
    System {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Refresh periodically and print the top processes
    Watch {
        /// Refresh interval in seconds (overrides config)
        #[arg(short = 'i', long)]
        interval: Option<u64>,

        /// Number of processes per refresh
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Stop after this many refreshes (0 = until Ctrl+C)
        #[arg(long, default_value_t = 0)]
        iterations: usize,
    },

    /// Serve the inventory over HTTP
    Serve,

    /// Check that the external tools are available
    Check {
        /// Run one full scan and report its timing
        #[arg(long)]
        scan: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
