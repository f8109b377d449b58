//! Checkout orchestration
//!
//! The top-level coordinator for one shopper's pass: stock revalidation →
//! order commit → dispense sequencing. Validation and commit run
//! synchronously to completion (abort on failure, nothing physical has
//! happened yet); the sequencer then runs as its own task and reports
//! through the session's watch channel.
//!
//! Phase machine: `idle → validating → committing → awaiting_confirm →
//! dispensing → complete`, with `aborted` reachable from validating or
//! committing only.

use super::committer::{CommitError, OrderCommitter};
use super::estimator::{self, ProgressParams};
use super::sequencer::DispenseSequencer;
use super::validator;
use crate::issues::SystemIssueLog;
use crate::machine::DispenseGateway;
use crate::store::{StoreError, StoreGateway};
use chrono::{DateTime, Utc};
use shared::cart::CartLine;
use shared::dispense::{CheckoutPhase, CheckoutStatus};
use shared::order::{LineRejection, ValidatedOrder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Checkout failures surfaced to the caller
///
/// Dispense-level failures never appear here: once dispensing starts the
/// session always runs forward to completion.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Stock validation rejected {} line(s)", .0.len())]
    Rejected(Vec<LineRejection>),

    #[error("Catalog fetch failed: {0}")]
    Catalog(#[from] StoreError),

    #[error(transparent)]
    Commit(#[from] CommitError),
}

/// One shopper's checkout session
///
/// Owns the watch channel every presentation layer reads from. The session
/// is discarded only by an explicit clear once it has reached a terminal
/// phase.
pub struct CheckoutSession {
    /// Session ID
    pub id: String,
    /// Machine this session dispenses from
    pub machine_id: String,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    progress_tx: watch::Sender<CheckoutStatus>,
    cancel: CancellationToken,
}

impl CheckoutSession {
    pub fn new(machine_id: impl Into<String>, cancel: CancellationToken) -> Self {
        let (progress_tx, _) = watch::channel(CheckoutStatus::idle());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            machine_id: machine_id.into(),
            created_at: Utc::now(),
            progress_tx,
            cancel,
        }
    }

    /// Latest published status
    pub fn status(&self) -> CheckoutStatus {
        self.progress_tx.borrow().clone()
    }

    /// Subscribe to status changes
    pub fn subscribe(&self) -> watch::Receiver<CheckoutStatus> {
        self.progress_tx.subscribe()
    }

    /// Current composite phase
    pub fn phase(&self) -> CheckoutPhase {
        self.progress_tx.borrow().phase
    }

    /// Whether the session may be cleared
    ///
    /// Clearing is the only operation permitted to discard session state,
    /// and only once the flow has finished or aborted.
    pub fn can_clear(&self) -> bool {
        self.phase().is_terminal()
    }

    fn publish(&self, status: CheckoutStatus) {
        self.progress_tx.send_replace(status);
    }

    fn publish_phase(&self, phase: CheckoutPhase) {
        let mut status = CheckoutStatus::idle();
        status.phase = phase;
        self.publish(status);
    }

    fn publish_rejected(&self, rejections: Vec<LineRejection>) {
        let mut status = CheckoutStatus::idle();
        status.phase = CheckoutPhase::Aborted;
        status.rejections = Some(rejections);
        self.publish(status);
    }

    fn publish_aborted(&self, transaction_id: Option<String>, reason: String) {
        let mut status = CheckoutStatus::idle();
        status.phase = CheckoutPhase::Aborted;
        status.transaction_id = transaction_id;
        status.abort_reason = Some(reason);
        self.publish(status);
    }
}

/// The checkout orchestrator
///
/// Stateless over sessions; everything session-specific lives in the
/// [`CheckoutSession`] it is handed.
pub struct CheckoutOrchestrator {
    store: Arc<dyn StoreGateway>,
    dispenser: Arc<dyn DispenseGateway>,
    issues: Arc<SystemIssueLog>,
    machine_id: String,
    tax_rate_percent: f64,
    dispense_timeout: Duration,
    progress: ProgressParams,
}

impl CheckoutOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn StoreGateway>,
        dispenser: Arc<dyn DispenseGateway>,
        issues: Arc<SystemIssueLog>,
        machine_id: impl Into<String>,
        tax_rate_percent: f64,
        dispense_timeout: Duration,
        progress: ProgressParams,
    ) -> Self {
        Self {
            store,
            dispenser,
            issues,
            machine_id: machine_id.into(),
            tax_rate_percent,
            dispense_timeout,
            progress,
        }
    }

    /// Run one checkout: validate, commit, then hand off to the sequencer
    ///
    /// Returns once dispensing has been started (or the checkout aborted);
    /// the caller follows dispensing through the session's status surface.
    pub async fn run_checkout(
        &self,
        session: &CheckoutSession,
        lines: Vec<CartLine>,
        buyer_id: Option<String>,
    ) -> Result<CheckoutStatus, CheckoutError> {
        if lines.is_empty() {
            session.publish_aborted(None, "Cart is empty".into());
            return Err(CheckoutError::EmptyCart);
        }

        // ===== Validating =====
        session.publish_phase(CheckoutPhase::Validating);
        let catalog = match self.store.fetch_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!(session_id = %session.id, error = %e, "Catalog fetch failed");
                session.publish_aborted(None, format!("Catalog fetch failed: {e}"));
                return Err(e.into());
            }
        };
        if let Err(rejections) = validator::validate_cart(&lines, &catalog) {
            tracing::warn!(
                session_id = %session.id,
                rejected = rejections.len(),
                "Stock validation rejected checkout"
            );
            session.publish_rejected(rejections.clone());
            return Err(CheckoutError::Rejected(rejections));
        }

        // ===== Committing =====
        session.publish_phase(CheckoutPhase::Committing);
        let committer = OrderCommitter::new(
            self.store.clone(),
            self.issues.clone(),
            self.machine_id.clone(),
            self.tax_rate_percent,
        );
        let order = committer.build_order(lines);
        if let Err(e) = committer.commit(&order, buyer_id).await {
            tracing::error!(
                session_id = %session.id,
                transaction_id = %order.transaction_id,
                error = %e,
                "Order commit failed"
            );
            session.publish_aborted(Some(order.transaction_id.clone()), e.to_string());
            return Err(e.into());
        }

        // ===== Awaiting confirm → Dispensing =====
        let status = self.start_sequencer(session, &order);
        Ok(status)
    }

    /// Publish the confirmation snapshot and spawn the sequencer task
    fn start_sequencer(&self, session: &CheckoutSession, order: &ValidatedOrder) -> CheckoutStatus {
        let sequencer = Arc::new(DispenseSequencer::new(
            order,
            self.dispenser.clone(),
            session.progress_tx.clone(),
            self.dispense_timeout,
            self.progress,
        ));

        // One published transition with the full queue preview, so the
        // payment confirmation can render before progress starts moving.
        let preview = sequencer.snapshot();
        let report = estimator::estimate(&preview, &self.progress);
        let status = CheckoutStatus {
            phase: CheckoutPhase::AwaitingConfirm,
            transaction_id: Some(order.transaction_id.clone()),
            rejections: None,
            abort_reason: None,
            failed_units: 0,
            current_index: preview.current_index,
            overall_status: preview.overall_status,
            queue: preview.queue,
            items_remaining: report.items_remaining,
            units_remaining: report.units_remaining,
            estimated_seconds_remaining: report.estimated_seconds_remaining,
        };
        session.publish(status.clone());

        tracing::info!(
            session_id = %session.id,
            transaction_id = %order.transaction_id,
            units = order.unit_count(),
            "Dispense sequencing handed off"
        );
        let cancel = session.cancel.clone();
        tokio::spawn(async move {
            sequencer.run(cancel).await;
        });
        status
    }
}
