//! Inventory endpoint handlers.
//!
//! - `GET /processes?category=&type=&refresh=`
//! - `GET /processes/top?by=cpu|memory&n=`
//! - `GET /processes/{pid}`
//! - `POST /processes/{pid}/kill?force=`

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use herakles_proc_monitor::{
    IconHandle, IconResolver, InventoryState, ProcessCategory, ProcessRecord, ProcessType,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::state::SharedState;

const DEFAULT_TOP_N: usize = 10;

/// Error type for inventory endpoint failures.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(u32),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(pid) => (
                StatusCode::NOT_FOUND,
                format!("No process with pid {} in the current inventory", pid),
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub process_type: Option<String>,
    /// Reporting view: daemons also lists system daemons.
    pub group: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct TopParams {
    pub by: Option<String>,
    pub n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct KillParams {
    #[serde(default)]
    pub force: bool,
}

/// Record plus its resolved icon.
#[derive(Debug, Serialize)]
pub struct ProcessView {
    #[serde(flatten)]
    pub record: ProcessRecord,
    pub icon: IconHandle,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub state: InventoryState,
    pub built_at: Option<DateTime<Utc>>,
    pub count: usize,
    pub processes: Vec<ProcessView>,
}

#[derive(Debug, Serialize)]
pub struct KillResponse {
    pub pid: u32,
    pub signal: &'static str,
    pub delivered: bool,
}

fn parse_category(name: &str) -> Result<ProcessCategory, ApiError> {
    ProcessCategory::from_name(name)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown category '{}'", name)))
}

fn parse_type(name: &str) -> Result<ProcessType, ApiError> {
    ProcessType::from_name(name)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown process type '{}'", name)))
}

fn views(state: &SharedState, records: Vec<ProcessRecord>) -> Vec<ProcessView> {
    let icons = state.manager.icons();
    records
        .into_iter()
        .map(|record| ProcessView {
            icon: icons.resolve(&record),
            record,
        })
        .collect()
}

/// Handler for `GET /processes`.
#[instrument(skip(state))]
pub async fn list_handler(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    debug!("Processing /processes request");

    let category = params.category.as_deref().map(parse_category).transpose()?;
    let group = params.group.as_deref().map(parse_category).transpose()?;
    let process_type = params.process_type.as_deref().map(parse_type).transpose()?;

    let snapshot = state.manager.snapshot(params.refresh).await;
    let mut records = match (category, group) {
        (Some(category), _) => state.manager.by_category(category).await,
        (None, Some(group)) => state.manager.by_type_group(group).await,
        (None, None) => state.manager.get_all(false).await,
    };
    if let Some(process_type) = process_type {
        records.retain(|r| r.process_type() == process_type);
    }

    Ok(Json(ListResponse {
        state: state.manager.state().await,
        built_at: Some(snapshot.built_at),
        count: records.len(),
        processes: views(&state, records),
    }))
}

/// Handler for `GET /processes/top`.
#[instrument(skip(state))]
pub async fn top_handler(
    State(state): State<SharedState>,
    Query(params): Query<TopParams>,
) -> Result<Json<Vec<ProcessView>>, ApiError> {
    let n = params.n.unwrap_or(DEFAULT_TOP_N);
    state.manager.get_all(false).await;

    let records = match params.by.as_deref().unwrap_or("cpu") {
        "cpu" => state.manager.top_by_cpu(n).await,
        "memory" | "mem" => state.manager.top_by_memory(n).await,
        other => {
            return Err(ApiError::BadRequest(format!(
                "Invalid sort key '{}', expected cpu or memory",
                other
            )))
        }
    };
    Ok(Json(views(&state, records)))
}

/// Handler for `GET /processes/{pid}`.
#[instrument(skip(state))]
pub async fn process_handler(
    State(state): State<SharedState>,
    Path(pid): Path<u32>,
) -> Result<Json<ProcessView>, ApiError> {
    let record = state
        .manager
        .inspect(pid)
        .await
        .ok_or(ApiError::NotFound(pid))?;
    let icon = state.manager.icons().resolve(&record);
    Ok(Json(ProcessView { record, icon }))
}

/// Handler for `POST /processes/{pid}/kill`.
#[instrument(skip(state))]
pub async fn kill_handler(
    State(state): State<SharedState>,
    Path(pid): Path<u32>,
    Query(params): Query<KillParams>,
) -> impl IntoResponse {
    let (signal, delivered) = if params.force {
        ("SIGKILL", state.manager.force_kill_process(pid).await)
    } else {
        ("SIGTERM", state.manager.kill_process(pid).await)
    };
    info!(pid, signal, delivered, "kill requested over HTTP");

    let status = if delivered {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    (
        status,
        Json(KillResponse {
            pid,
            signal,
            delivered,
        }),
    )
}
