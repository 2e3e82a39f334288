//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! inventory state and scan statistics as plain text.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use herakles_proc_monitor::InventoryState;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let inventory_state = state.manager.state().await;
    let (status, message) = match inventory_state {
        InventoryState::Ready => (StatusCode::OK, "OK"),
        InventoryState::Degraded => (StatusCode::OK, "OK - Degraded (process table unavailable)"),
        InventoryState::Loading => (StatusCode::SERVICE_UNAVAILABLE, "Loading"),
    };

    let uptime_hours = state.start_time.elapsed().as_secs_f64() / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let cache_age = state
        .manager
        .cache_age()
        .await
        .map(|age| format!("{:.1}s", age.as_secs_f64()))
        .unwrap_or_else(|| "-".to_string());

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime:        {uptime_str}\nScans:         {}\nLast scan:     {:.1}ms\nCache age:     {cache_age}\nIcons cached:  {}\n",
            state.manager.scan_count(),
            state.manager.last_scan_duration().as_secs_f64() * 1000.0,
            state.manager.icons().len(),
        ),
    )
}
