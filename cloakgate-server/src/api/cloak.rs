//! Cloaking dry run: shows what an outbound request would look like.

use axum::{extract::State, response::Json};

use cloakgate_core::cloak::{CloakOutcome, CloakRequest};

use crate::state::AppState;

/// POST /api/cloak/preview
///
/// Runs the full cloaking path, so it does advance session pools and records
/// a trace when tracing is on.
pub async fn preview_cloak(State(state): State<AppState>, Json(request): Json<CloakRequest>) -> Json<CloakOutcome> {
    Json(state.cloaker().cloak(request))
}
