//! Unified Error Handling
//!
//! Provides application-wide error types and response structures

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use shared::order::LineRejection;
use tracing::error;

/// Unified API response structure
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Application-level error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Business Logic Errors ==========
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Stock validation rejected {} line(s)", .0.len())]
    StockRejected(Vec<LineRejection>),

    #[error("Checkout aborted: {reason}")]
    CheckoutAborted { session_id: String, reason: String },

    // ========== System Errors ==========
    #[error("Upstream gateway error: {0}")]
    Gateway(String),
}

/// Body payload for an aborted checkout: the session id the operator
/// queries the abort trail under.
#[derive(Debug, Serialize)]
pub struct AbortedSession {
    pub session_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            // Stock rejections carry the structured list, not just a message
            AppError::StockRejected(rejections) => {
                let body = Json(AppResponse {
                    code: "E1001".to_string(),
                    message: "Stock validation failed".to_string(),
                    data: Some(rejections),
                });
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }

            // Aborted checkout (502): the specific reason plus the session
            // id the abort trail stays registered under
            AppError::CheckoutAborted { session_id, reason } => {
                error!(target: "checkout", session_id = %session_id, error = %reason, "Checkout aborted");
                let body = Json(AppResponse {
                    code: "E1002".to_string(),
                    message: reason,
                    data: Some(AbortedSession { session_id }),
                });
                return (StatusCode::BAD_GATEWAY, body).into_response();
            }

            // Not found (404)
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg),

            // Conflict (409)
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "E0004", msg),

            // Validation (400)
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg),

            // Upstream gateway errors (502), message passed through
            AppError::Gateway(msg) => {
                error!(target: "gateway", error = %msg, "Upstream gateway error");
                (StatusCode::BAD_GATEWAY, "E9003", msg)
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message,
            data: None,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

// ========== Helper functions ==========

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: "Success".to_string(),
        data: Some(data),
    })
}
