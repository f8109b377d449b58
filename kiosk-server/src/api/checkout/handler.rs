//! Checkout API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use shared::cart::{CartLine, CartLineInput};
use shared::dispense::CheckoutStatus;
use validator::Validate;

use crate::checkout::CheckoutError;
use crate::common::{AppError, AppResponse, AppResult, ok};
use crate::core::ServerState;

/// Checkout request payload
#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    /// Cart lines, frozen at checkout start
    #[validate(length(min = 1, message = "cart must not be empty"))]
    pub lines: Vec<CartLineInput>,
    /// Signed-in shopper, if any
    pub buyer_id: Option<String>,
}

/// Checkout start response
#[derive(Debug, Serialize)]
pub struct CheckoutStarted {
    pub session_id: String,
    pub status: CheckoutStatus,
}

/// Start a checkout session
///
/// Runs validation and commit synchronously; on success dispensing is
/// already underway when this returns. Validation rejections come back as
/// a structured 422 and leave the shopper's cart untouched.
pub async fn start(
    State(state): State<ServerState>,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<AppResponse<CheckoutStarted>>> {
    payload.validate()?;
    if payload.lines.iter().any(|l| l.quantity == 0) {
        return Err(AppError::Validation(
            "line quantity must be at least 1".into(),
        ));
    }

    let lines: Vec<CartLine> = payload.lines.into_iter().map(CartLine::from).collect();
    let session = state.create_session();
    let orchestrator = state.orchestrator();

    match orchestrator
        .run_checkout(&session, lines, payload.buyer_id)
        .await
    {
        Ok(status) => Ok(ok(CheckoutStarted {
            session_id: session.id.clone(),
            status,
        })),
        Err(CheckoutError::Rejected(rejections)) => {
            // Nothing persisted, nothing dispensed: the session has no
            // value, recycle it right away and send the shopper back to
            // the cart.
            state.remove_session(&session.id);
            Err(AppError::StockRejected(rejections))
        }
        Err(CheckoutError::EmptyCart) => {
            state.remove_session(&session.id);
            Err(AppError::Validation("cart must not be empty".into()))
        }
        Err(e @ CheckoutError::Catalog(_)) => {
            // Catalog outage during validation: nothing persisted yet, the
            // session has no trail worth keeping.
            state.remove_session(&session.id);
            Err(AppError::Gateway(e.to_string()))
        }
        Err(e @ CheckoutError::Commit(_)) => {
            // An order record may already exist. Keep the aborted session
            // registered and hand its id back so the trail stays reachable.
            Err(AppError::CheckoutAborted {
                session_id: session.id.clone(),
                reason: e.to_string(),
            })
        }
    }
}

/// Current checkout status read model
pub async fn get_status(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<AppResponse<CheckoutStatus>>> {
    let session = state
        .get_session(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;
    Ok(ok(session.status()))
}

/// Clear a finished session
///
/// Only legal once the session is terminal (complete or aborted); a
/// dispensing session is paid and committed and must run to completion.
pub async fn clear(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<AppResponse<()>>> {
    state.clear_session(&session_id)?;
    Ok(ok(()))
}
