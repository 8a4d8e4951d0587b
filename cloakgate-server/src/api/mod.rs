//! API Routes
//!
//! Management endpoints mounted under `/api`.

mod cloak;
mod masquerade_trace;


use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Status
        .route("/status", get(get_status))
        // Masquerade trace
        .route(
            "/masquerade-trace",
            get(masquerade_trace::list_traces).delete(masquerade_trace::clear_traces),
        )
        .route("/masquerade-trace/enabled", post(masquerade_trace::set_trace_enabled))
        .route("/masquerade-trace/:id", get(masquerade_trace::get_trace))
        // Cloaking dry run
        .route("/cloak/preview", post(cloak::preview_cloak))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub cloak_mode: String,
    pub session_pools: usize,
    pub trace_enabled: bool,
    pub trace_count: usize,
    pub trace_capacity: usize,
    pub fingerprint_enabled: bool,
    pub cached_hosts: Vec<String>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let traces = state.traces();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        cloak_mode: state.cloaker().config().mode.to_string(),
        session_pools: state.registry().pool_count(),
        trace_enabled: traces.is_enabled(),
        trace_count: traces.count(),
        trace_capacity: traces.capacity(),
        fingerprint_enabled: state.transport().is_some(),
        cached_hosts: state.transport().map(|t| t.cached_hosts()).unwrap_or_default(),
    })
}
