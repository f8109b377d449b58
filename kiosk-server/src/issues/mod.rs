//! System issue log
//!
//! In-memory, append-only record of commit inconsistencies. The store
//! backend has no cross-record transaction, so when an order persists but a
//! stock decrement fails the kiosk records the exact delta for the operator
//! instead of guessing. A relative `stock = stock - qty` update is not
//! idempotent, which rules out blind automatic retry.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared::cart::CartLine;

/// Issue kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    /// Order persisted but this line's stock decrement did not apply
    UnreconciledStockDecrement,
}

/// One recorded issue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemIssue {
    /// Issue ID
    pub id: String,
    /// Issue kind
    pub kind: IssueKind,
    /// Transaction of the affected order
    pub transaction_id: String,
    /// Affected product
    pub product_id: String,
    /// Quantity that was purchased but not decremented
    pub quantity: u32,
    /// Underlying error text
    pub detail: String,
    /// When the issue was recorded
    pub created_at: DateTime<Utc>,
}

impl SystemIssue {
    /// Record an order line whose stock decrement failed after the order
    /// was already persisted
    pub fn unreconciled_decrement(
        transaction_id: impl Into<String>,
        line: &CartLine,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: IssueKind::UnreconciledStockDecrement,
            transaction_id: transaction_id.into(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            detail: detail.into(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only issue log shared across the server
#[derive(Debug, Default)]
pub struct SystemIssueLog {
    entries: RwLock<Vec<SystemIssue>>,
}

impl SystemIssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an issue
    pub fn record(&self, issue: SystemIssue) {
        tracing::error!(
            target: "reconcile",
            issue_id = %issue.id,
            kind = ?issue.kind,
            transaction_id = %issue.transaction_id,
            product_id = %issue.product_id,
            quantity = issue.quantity,
            detail = %issue.detail,
            "System issue recorded, manual reconciliation required"
        );
        self.entries.write().push(issue);
    }

    /// All recorded issues, oldest first
    pub fn list(&self) -> Vec<SystemIssue> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
