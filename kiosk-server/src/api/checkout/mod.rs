//! Checkout API Module
//!
//! The one write surface of the kiosk: start a checkout, follow its
//! progress, clear the finished session. All orchestration lives in the
//! checkout core; handlers only translate.

pub mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Checkout router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/checkout", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        // Start a checkout (validate → commit → dispense)
        .route("/", post(handler::start))
        // Progress/status read model
        .route("/{session_id}", get(handler::get_status))
        // Discard a finished session, returning the kiosk to idle
        .route("/{session_id}/clear", post(handler::clear))
}
