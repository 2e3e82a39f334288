//! Configuration management for herakles-proc-monitor.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use herakles_proc_monitor::{ClassifierConfig, ManagerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5;
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SERVICE_QUERY_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_PATH_LOOKUP_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_KILL_REFRESH_DELAY_MS: u64 = 1000;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_ICON_PREFETCH_COUNT: usize = 20;

/// Configuration validation failures.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("classifier.{0} must not be empty")]
    EmptyList(&'static str),

    #[error("Invalid log_level '{0}', expected off|error|warn|info|debug|trace")]
    InvalidLogLevel(String),

    #[error("Invalid bind address '{0}'")]
    InvalidBind(String),
}

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Logging
    pub log_level: Option<String>,

    // Inventory cache and scanning
    #[serde(alias = "cache_ttl", alias = "cache-ttl")]
    pub cache_ttl_secs: Option<u64>,
    #[serde(alias = "scan-timeout-ms")]
    pub scan_timeout_ms: Option<u64>,
    #[serde(alias = "service-query-timeout-ms")]
    pub service_query_timeout_ms: Option<u64>,
    #[serde(alias = "path-lookup-timeout-ms")]
    pub path_lookup_timeout_ms: Option<u64>,
    #[serde(alias = "kill-refresh-delay-ms")]
    pub kill_refresh_delay_ms: Option<u64>,
    #[serde(alias = "refresh-interval-secs")]
    pub refresh_interval_secs: Option<u64>,
    pub parallelism: Option<usize>,

    // Presentation
    #[serde(alias = "show-system-processes")]
    pub show_system_processes: Option<bool>,
    #[serde(alias = "icon-prefetch-count")]
    pub icon_prefetch_count: Option<usize>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // Classification rules
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            log_level: Some("warn".into()),
            cache_ttl_secs: Some(DEFAULT_CACHE_TTL_SECS),
            scan_timeout_ms: Some(DEFAULT_SCAN_TIMEOUT_MS),
            service_query_timeout_ms: Some(DEFAULT_SERVICE_QUERY_TIMEOUT_MS),
            path_lookup_timeout_ms: Some(DEFAULT_PATH_LOOKUP_TIMEOUT_MS),
            kill_refresh_delay_ms: Some(DEFAULT_KILL_REFRESH_DELAY_MS),
            refresh_interval_secs: Some(DEFAULT_REFRESH_INTERVAL_SECS),
            parallelism: None,
            show_system_processes: Some(true),
            icon_prefetch_count: Some(DEFAULT_ICON_PREFETCH_COUNT),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl Config {
    /// Coordinator settings derived from the effective config.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS)),
            scan_timeout: Duration::from_millis(
                self.scan_timeout_ms.unwrap_or(DEFAULT_SCAN_TIMEOUT_MS),
            ),
            service_timeout: Duration::from_millis(
                self.service_query_timeout_ms
                    .unwrap_or(DEFAULT_SERVICE_QUERY_TIMEOUT_MS),
            ),
            path_timeout: Duration::from_millis(
                self.path_lookup_timeout_ms
                    .unwrap_or(DEFAULT_PATH_LOOKUP_TIMEOUT_MS),
            ),
            kill_refresh_delay: Duration::from_millis(
                self.kill_refresh_delay_ms
                    .unwrap_or(DEFAULT_KILL_REFRESH_DELAY_MS),
            ),
            show_system_processes: self.show_system_processes.unwrap_or(true),
            icon_prefetch_count: self
                .icon_prefetch_count
                .unwrap_or(DEFAULT_ICON_PREFETCH_COUNT),
            classifier: self.classifier.clone(),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(
            self.refresh_interval_secs
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
        )
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    let durations = [
        ("cache_ttl_secs", cfg.cache_ttl_secs),
        ("scan_timeout_ms", cfg.scan_timeout_ms),
        ("service_query_timeout_ms", cfg.service_query_timeout_ms),
        ("path_lookup_timeout_ms", cfg.path_lookup_timeout_ms),
        ("refresh_interval_secs", cfg.refresh_interval_secs),
    ];
    if let Some((name, _)) = durations.iter().find(|(_, value)| *value == Some(0)) {
        return Err(ConfigError::ZeroValue(name));
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if !matches!(
            level.to_ascii_lowercase().as_str(),
            "off" | "error" | "warn" | "info" | "debug" | "trace"
        ) {
            return Err(ConfigError::InvalidLogLevel(level.to_string()));
        }
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::InvalidBind(bind.to_string()));
        }
    }

    let classifier = &cfg.classifier;
    let lists = [
        ("kernel_names", &classifier.kernel_names),
        ("system_app_roots", &classifier.system_app_roots),
        ("system_daemon_roots", &classifier.system_daemon_roots),
        ("daemon_descriptor_markers", &classifier.daemon_descriptor_markers),
        ("agent_descriptor_markers", &classifier.agent_descriptor_markers),
    ];
    if let Some((name, _)) = lists.iter().find(|(_, list)| list.is_empty()) {
        return Err(ConfigError::EmptyList(name));
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(cache_ttl) = args.cache_ttl {
        config.cache_ttl_secs = Some(cache_ttl);
    }
    if let Some(timeout) = args.scan_timeout_ms {
        config.scan_timeout_ms = Some(timeout);
    }
    if args.hide_system {
        config.show_system_processes = Some(false);
    }
    if args.parallelism.is_some() {
        config.parallelism = args.parallelism;
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            // Try default locations
            let defaults = [
                "/etc/herakles/proc-monitor.yaml",
                "/etc/herakles/proc-monitor.yml",
                "/etc/herakles/proc-monitor.json",
                "./herakles-proc-monitor.yaml",
                "./herakles-proc-monitor.yml",
                "./herakles-proc-monitor.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}
