//! System Issues API Module
//!
//! Read-only view of recorded commit inconsistencies for the operator.

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

/// System issues router
pub fn router() -> Router<ServerState> {
    Router::new().route("/api/system-issues", get(handler::list))
}
