//! Order commit
//!
//! Persists the order record and decrements per-product stock. The two
//! steps are dependent, not atomic: the backing store has no cross-record
//! transaction. Once `create_order` returns, payment is final from the
//! shopper's perspective; a decrement failure after that point is a
//! recoverable inconsistency recorded in the system issue log, never a
//! rollback.

use super::money;
use crate::issues::{SystemIssue, SystemIssueLog};
use crate::store::{StoreError, StoreGateway};
use shared::cart::CartLine;
use shared::order::{StoredOrder, ValidatedOrder, generate_transaction_id};
use std::sync::Arc;

/// Commit errors
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// Order persist failed - nothing was written, checkout aborts cleanly
    #[error("Order persist failed: {0}")]
    OrderPersist(#[source] StoreError),

    /// Order persisted but one or more stock decrements did not apply
    #[error("Stock decrement failed for {failed} of {total} line(s); order {transaction_id} needs reconciliation")]
    StockDecrement {
        transaction_id: String,
        failed: usize,
        total: usize,
    },
}

/// Order committer
pub struct OrderCommitter {
    store: Arc<dyn StoreGateway>,
    issues: Arc<SystemIssueLog>,
    machine_id: String,
    tax_rate_percent: f64,
}

impl OrderCommitter {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        issues: Arc<SystemIssueLog>,
        machine_id: impl Into<String>,
        tax_rate_percent: f64,
    ) -> Self {
        Self {
            store,
            issues,
            machine_id: machine_id.into(),
            tax_rate_percent,
        }
    }

    /// Build the validated order: totals plus a fresh transaction ID
    ///
    /// Only called after every line passed stock validation.
    pub fn build_order(&self, lines: Vec<CartLine>) -> ValidatedOrder {
        let totals = money::calculate_totals(&lines, self.tax_rate_percent);
        ValidatedOrder {
            lines,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            machine_id: self.machine_id.clone(),
            transaction_id: generate_transaction_id(),
        }
    }

    /// Persist the order, then decrement stock line by line
    ///
    /// If one decrement fails the remaining lines are still attempted, so
    /// the inconsistency window stays as small as the failures themselves.
    /// Every failed delta goes into the issue log keyed by transaction ID.
    /// No retry here: the decrement is relative and therefore not
    /// idempotent.
    pub async fn commit(
        &self,
        order: &ValidatedOrder,
        buyer_id: Option<String>,
    ) -> Result<StoredOrder, CommitError> {
        let stored = self
            .store
            .create_order(&order.to_record(buyer_id))
            .await
            .map_err(CommitError::OrderPersist)?;

        let mut failed = 0usize;
        for line in &order.lines {
            if let Err(e) = self
                .store
                .decrement_stock(&line.product_id, line.quantity)
                .await
            {
                failed += 1;
                self.issues.record(SystemIssue::unreconciled_decrement(
                    &order.transaction_id,
                    line,
                    e.to_string(),
                ));
            }
        }

        if failed > 0 {
            return Err(CommitError::StockDecrement {
                transaction_id: order.transaction_id.clone(),
                failed,
                total: order.lines.len(),
            });
        }

        tracing::info!(
            transaction_id = %order.transaction_id,
            order_id = %stored.id,
            lines = order.lines.len(),
            total = order.total,
            "Order committed, stock decremented"
        );
        Ok(stored)
    }
}
