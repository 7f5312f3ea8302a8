//! Admin API for the key pool
//!
//! Runs on a separate listener (`server.admin_listen_addr`) that should not
//! be exposed publicly. Never returns key material, only hints.
//!
//! Endpoints:
//! - GET  /admin/keys        rotation pointer, usage, failed set
//! - POST /admin/keys/reset  clear the failed set

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use key_pool::Orchestrator;
use tracing::info;

#[derive(Clone)]
pub struct AdminState {
    orchestrator: Arc<Orchestrator>,
}

impl AdminState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/keys", get(list_keys))
        .route("/admin/keys/reset", post(reset_keys))
        .with_state(state)
}

/// GET /admin/keys
async fn list_keys(State(state): State<AdminState>) -> impl IntoResponse {
    let snapshot = state.orchestrator.pool().snapshot().await;
    let secondary = state.orchestrator.secondary();

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "pool": snapshot,
            "secondary": {
                "id": secondary.id(),
                "configured": secondary.is_configured(),
                "usage_count": state.orchestrator.secondary_usage(),
            },
        })
        .to_string(),
    )
}

/// POST /admin/keys/reset
async fn reset_keys(State(state): State<AdminState>) -> impl IntoResponse {
    let cleared = state.orchestrator.pool().reset_failed().await;
    info!(cleared, "failed set reset via admin API");

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "status": "reset", "cleared": cleared }).to_string(),
    )
}
