//! Metrics endpoint handler for Prometheus scraping.
//!
//! Serves the cached inventory; a scrape only scans when the cache is stale.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use tracing::{debug, error, instrument, warn};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 16 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    debug!("Processing /metrics request");

    let records = state.manager.get_all(false).await;
    state.metrics.observe_inventory(&records);
    state.metrics.observe_scans(
        state.manager.scan_count(),
        state.manager.last_scan_duration(),
        state.manager.cache_age().await,
        state.manager.state().await,
    );

    match state.manager.system_info().await {
        Ok(memory) => state.metrics.observe_memory(&memory),
        Err(e) => warn!("System memory unavailable: {}", e),
    }

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return Err(MetricsError::EncodingFailed);
    }

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}
