use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
    /// Consumer state, or `"disabled"` when no consumer runs.
    pub consumer: &'static str,
}

/// `GET /api/v1/health`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let consumer = state
        .consumer_state
        .as_ref()
        .map_or("disabled", |rx| rx.borrow().as_str());

    Json(HealthResponse {
        status: "OK",
        sessions: state.registry.len().await,
        consumer,
    })
}
