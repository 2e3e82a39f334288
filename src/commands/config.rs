//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-proc-monitor.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Process Monitor Configuration
# ======================================
#
# Server Configuration (serve mode)
# ---------------------------------
# bind: "127.0.0.1"            # Bind IP
# port: 9216                   # HTTP port
#
# Inventory Cache and Scanning
# ----------------------------
# cache_ttl_secs: 5            # Serve the cached inventory for N seconds
# scan_timeout_ms: 5000        # Hard timeout of the ps process-table scan
# service_query_timeout_ms: 1000  # Timeout of one launchctl procinfo query
# path_lookup_timeout_ms: 1000 # Timeout of the lsof executable-path fallback
# kill_refresh_delay_ms: 1000  # Re-scan delay after a kill signal
# refresh_interval_secs: 2     # Interval of `watch` and auto refresh
# parallelism: null            # Classification threads (null = auto)
#
# Presentation
# ------------
# show_system_processes: true  # false hides system daemons and kernel processes
# icon_prefetch_count: 20      # Icons resolved ahead of time after each scan
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
# enable_telemetry: true       # Enable /metrics scan telemetry
#
# Logging
# -------
# log_level: "warn"            # off, error, warn, info, debug, trace
#
# Classifier
# ----------
# classifier.kernel_names              # Exact names of the kernel pseudo-process
# classifier.session_manager_names     # Login session bundles, always system apps
# classifier.system_app_roots          # Bundles under these are system applications
# classifier.system_daemon_roots       # Executables under these are system daemons
# classifier.user_agent_roots          # Executables under these are user daemons (~ = $HOME)
# classifier.daemon_descriptor_markers # Service definition path markers for system daemons
# classifier.agent_descriptor_markers  # Service definition path markers for user daemons
# classifier.background_name_tokens    # Name substrings marking background tasks
"#;

    format!("{comments}\n{yaml}")
}
