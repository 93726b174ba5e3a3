//! Health and statistics endpoints.

use super::AppStateArc;
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

pub fn routes() -> Router<AppStateArc> {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/", get(root))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    active_conversations: usize,
    telegram_enabled: bool,
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        active_conversations: state.use_case.store().active_count().await,
        telegram_enabled: state.telegram.is_some(),
    })
}

async fn stats(State(state): State<AppStateArc>) -> Json<crossbar_application::StatsSnapshot> {
    let active = state.use_case.store().active_count().await;
    Json(state.use_case.stats().snapshot(active))
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "crossbar",
        "status": "running",
    }))
}
