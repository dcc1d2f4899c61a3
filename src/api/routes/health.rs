use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub records: usize,
    pub dimension: usize,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// The store is loaded at startup, so a running server is always ready; this
/// reports how much it holds.
pub async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let store = state.rag_service.vector_store();
    Json(ReadinessResponse {
        status: "ready".into(),
        records: store.len().await,
        dimension: store.dimension(),
    })
}
