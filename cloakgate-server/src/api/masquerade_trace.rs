//! Masquerade trace handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use cloakgate_types::{MasqueradeTraceRecord, MasqueradeTraceSummary};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct TraceListResponse {
    pub traces: Vec<MasqueradeTraceSummary>,
    pub count: usize,
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TraceToggle {
    pub enabled: bool,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(ErrorResponse { error: message.to_string() }))
}

/// GET /api/masquerade-trace
pub async fn list_traces(State(state): State<AppState>) -> Json<TraceListResponse> {
    let traces = state.traces().list();
    Json(TraceListResponse { count: traces.len(), enabled: state.traces().is_enabled(), traces })
}

/// GET /api/masquerade-trace/:id
pub async fn get_trace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MasqueradeTraceRecord>, ApiError> {
    if id.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "missing trace id"));
    }
    state
        .traces()
        .get(&id)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "trace record not found"))
}

/// DELETE /api/masquerade-trace
pub async fn clear_traces(State(state): State<AppState>) -> Json<ClearResponse> {
    state.traces().clear();
    Json(ClearResponse { success: true, message: "All masquerade trace records cleared".to_string() })
}

/// POST /api/masquerade-trace/enabled
///
/// Applies immediately and is saved to the config file so it survives a restart.
pub async fn set_trace_enabled(
    State(state): State<AppState>,
    Json(body): Json<TraceToggle>,
) -> Result<Json<TraceToggle>, ApiError> {
    state.traces().set_enabled(body.enabled);
    state.persist_trace_enabled(body.enabled).map_err(|e| {
        tracing::error!(error = %e, "Failed to persist masquerade trace setting");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
    })?;
    Ok(Json(TraceToggle { enabled: state.traces().is_enabled() }))
}
