//! Root endpoint handler listing the available endpoints.

use axum::{extract::State, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");
    let uptime_secs = state.start_time.elapsed().as_secs();
    let uptime_str = format!(
        "{}h {}m {}s",
        uptime_secs / 3600,
        (uptime_secs % 3600) / 60,
        uptime_secs % 60
    );

    let mut endpoints = vec![
        ("GET  /processes", "Classified inventory (?category=, ?type=, ?group=, ?refresh=true)"),
        ("GET  /processes/top", "Busiest processes (?by=cpu|memory, ?n=)"),
        ("GET  /processes/{pid}", "One process with parent, owner and start time"),
        ("POST /processes/{pid}/kill", "Terminate a process (?force=true for SIGKILL)"),
        ("GET  /system", "System memory totals"),
    ];
    if state.config.enable_health.unwrap_or(true) {
        endpoints.push(("GET  /health", "Inventory state and scan statistics"));
    }
    if state.config.enable_telemetry.unwrap_or(true) {
        endpoints.push(("GET  /metrics", "Prometheus scan telemetry"));
    }

    let mut body = format!("herakles-proc-monitor {version}\nUptime: {uptime_str}\n\nEndpoints:\n");
    for (route, description) in endpoints {
        body.push_str(&format!("  {:<28} {}\n", route, description));
    }

    ([("Content-Type", "text/plain; charset=utf-8")], body)
}
