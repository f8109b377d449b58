//! Dispense queue types and the checkout progress read model
//!
//! The dispense queue is owned exclusively by the sequencer; everything the
//! presentation layer sees is a serialized snapshot of these types.

use serde::{Deserialize, Serialize};

// ============================================================================
// Dispense Units
// ============================================================================

/// One atomic dispense action: one physical unit of one product
///
/// A cart line of quantity *n* expands to *n* units, preserving cart-line
/// order and, within a line, ascending unit index. This expansion is the
/// only place a quantity-N purchase becomes N discrete hardware actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispenseUnit {
    /// Product ID
    pub product_id: String,
    /// Product name snapshot
    pub name: String,
    /// Product image URL snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Position in the flattened unit sequence (0-based)
    pub sequence_index: usize,
    /// Unit index within its product (0-based)
    pub unit_index_within_product: u32,
}

/// Dispense request body - wire form of `POST /machines/{id}/dispense`
///
/// Always carries exactly one item with quantity 1. The actuator cannot
/// safely execute more than one motor command per request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispenseRequest {
    /// Transaction correlation key
    pub transaction_id: String,
    /// Items to dispense (always a single quantity-1 entry)
    pub items: Vec<DispenseRequestItem>,
}

/// One item of a dispense request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispenseRequestItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
}

// ============================================================================
// Queue State
// ============================================================================

/// 单个商品条目的出货状态
///
/// 状态单向推进: pending → dispensing → complete，complete 为终态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    #[default]
    Pending,
    Dispensing,
    Complete,
}

/// 整体出货状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    #[default]
    Pending,
    Dispensing,
    Complete,
}

/// Per-product dispense progress - one record per distinct product
///
/// `dispensed_count` counts *attempted* units and only increases; it never
/// exceeds `total_quantity`. `failed_count` tracks the subset of attempts
/// that errored or timed out, so partial delivery stays visible to the
/// operator even though sequencing never stalls on a failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispenseItemState {
    /// Product ID
    pub product_id: String,
    /// Product name snapshot
    pub name: String,
    /// Product image URL snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Units to dispense for this product
    pub total_quantity: u32,
    /// Units attempted so far (success or failure)
    pub dispensed_count: u32,
    /// Units whose dispense request failed or timed out
    #[serde(default)]
    pub failed_count: u32,
    /// Item status
    pub status: ItemStatus,
}

impl DispenseItemState {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        image: Option<String>,
        total_quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            image,
            total_quantity,
            dispensed_count: 0,
            failed_count: 0,
            status: ItemStatus::Pending,
        }
    }

    /// Units still to attempt for this item
    pub fn remaining(&self) -> u32 {
        self.total_quantity.saturating_sub(self.dispensed_count)
    }
}

/// Sequencer state - owned exclusively by the dispense sequencer
///
/// `in_flight` is true iff a dispense request is currently outstanding.
/// At most one unit request may be outstanding at any instant for a given
/// checkout session; the sequencer enforces this structurally and the flag
/// exists for the status read model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SequencerState {
    /// Queue of per-product progress records, in cart order
    pub queue: Vec<DispenseItemState>,
    /// Index of the item currently being worked
    pub current_index: usize,
    /// Whether a dispense request is outstanding
    pub in_flight: bool,
    /// Overall status
    pub overall_status: OverallStatus,
}

impl SequencerState {
    /// Sum of failed units across the queue
    pub fn failed_units(&self) -> u32 {
        self.queue.iter().map(|i| i.failed_count).sum()
    }
}

// ============================================================================
// Checkout Read Model
// ============================================================================

/// Composite checkout phase
///
/// `ABORTED` is reachable from `VALIDATING` or `COMMITTING` only. Once
/// dispensing starts the purchase is paid and committed, and the session
/// always runs forward to `COMPLETE`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutPhase {
    #[default]
    Idle,
    Validating,
    Committing,
    AwaitingConfirm,
    Dispensing,
    Complete,
    Aborted,
}

impl CheckoutPhase {
    /// Whether the session has reached a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutPhase::Complete | CheckoutPhase::Aborted)
    }
}

/// Checkout status read model - everything the presentation layer renders
///
/// Recomputed and published on every state change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutStatus {
    /// Composite phase
    pub phase: CheckoutPhase,
    /// Transaction ID, once committed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Validation rejections, when aborted during validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejections: Option<Vec<crate::order::LineRejection>>,
    /// Abort reason text, when aborted during commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    /// Dispense queue snapshot
    pub queue: Vec<DispenseItemState>,
    /// Index of the current queue item
    pub current_index: usize,
    /// Overall dispense status
    pub overall_status: OverallStatus,
    /// Queue items after the current one
    pub items_remaining: usize,
    /// Physical units still to attempt
    pub units_remaining: u32,
    /// Rough time estimate for the remaining units
    pub estimated_seconds_remaining: f64,
    /// Units whose dispense request failed (visible partial delivery)
    pub failed_units: u32,
}

impl CheckoutStatus {
    /// An idle status with an empty queue
    pub fn idle() -> Self {
        Self {
            phase: CheckoutPhase::Idle,
            transaction_id: None,
            rejections: None,
            abort_reason: None,
            queue: Vec::new(),
            current_index: 0,
            overall_status: OverallStatus::Pending,
            items_remaining: 0,
            units_remaining: 0,
            estimated_seconds_remaining: 0.0,
            failed_units: 0,
        }
    }
}
