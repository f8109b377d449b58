//! HTTP API
//!
//! Thin presentation adapter over the checkout core. Routers follow the
//! `api/{module}/{mod,handler}` layout; everything responds with the
//! unified `AppResponse` envelope.

pub mod checkout;
pub mod health;
pub mod system_issues;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// Build the full application router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(checkout::router())
        .merge(system_issues::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
