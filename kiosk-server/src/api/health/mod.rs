//! Health API Module

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::common::{AppResponse, ok};
use crate::core::ServerState;

/// Health router
pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Debug, Serialize)]
struct HealthInfo {
    status: &'static str,
    machine_id: String,
    version: &'static str,
    active_sessions: usize,
}

async fn health(State(state): State<ServerState>) -> Json<AppResponse<HealthInfo>> {
    ok(HealthInfo {
        status: "up",
        machine_id: state.config.machine_id.clone(),
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.sessions.len(),
    })
}
