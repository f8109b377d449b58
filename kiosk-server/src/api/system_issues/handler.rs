//! System Issues API Handlers

use axum::{Json, extract::State};

use crate::common::{AppResponse, ok};
use crate::core::ServerState;
use crate::issues::SystemIssue;

/// List recorded issues, oldest first
pub async fn list(State(state): State<ServerState>) -> Json<AppResponse<Vec<SystemIssue>>> {
    ok(state.issues.list())
}
