//! Shared types for the kiosk checkout pipeline
//!
//! Wire and state types used by both the kiosk server core and any
//! presentation client: catalog rows, cart snapshots, order records,
//! dispense queue state and the progress read model.

pub mod cart;
pub mod catalog;
pub mod dispense;
pub mod order;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use cart::{CartLine, CartLineInput};
pub use catalog::CatalogProduct;
pub use dispense::{
    CheckoutPhase, CheckoutStatus, DispenseItemState, DispenseRequest, DispenseRequestItem,
    DispenseUnit, ItemStatus, OverallStatus, SequencerState,
};
pub use order::{
    LineRejection, OrderRecord, OrderStatus, RejectReason, StoredOrder, ValidatedOrder,
    generate_transaction_id,
};
