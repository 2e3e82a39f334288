//! System memory endpoint handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{instrument, warn};

use crate::state::SharedState;

/// Handler for `GET /system`.
#[instrument(skip(state))]
pub async fn system_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match state.manager.system_info().await {
        Ok(memory) => (StatusCode::OK, Json(serde_json::json!(memory))),
        Err(e) => {
            warn!("System memory unavailable: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e })),
            )
        }
    }
}
