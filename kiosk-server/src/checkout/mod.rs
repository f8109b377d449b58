//! Checkout core
//!
//! The checkout-to-dispense pipeline that runs after the shopper confirms
//! payment:
//!
//! - **validator**: stock revalidation against the live catalog
//! - **committer**: order persist + per-line stock decrement
//! - **sequencer**: the per-unit dispense state machine (the core)
//! - **estimator**: pure remaining-work projection
//! - **orchestrator**: phase machine gluing the above together
//! - **money**: decimal-backed totals
//!
//! # Flow
//!
//! ```text
//! run_checkout(cart)
//!     ├─ validating   fetch fresh catalog, validate every line
//!     ├─ committing   persist order, decrement stock per line
//!     ├─ awaiting_confirm   queue preview published
//!     ├─ dispensing   sequencer task drives one unit at a time
//!     └─ complete     every queue item complete (sole success terminal)
//! ```

pub mod committer;
pub mod estimator;
pub mod money;
pub mod orchestrator;
pub mod sequencer;
pub mod validator;

// Re-exports
pub use committer::{CommitError, OrderCommitter};
pub use estimator::{ProgressParams, ProgressReport, estimate};
pub use orchestrator::{CheckoutError, CheckoutOrchestrator, CheckoutSession};
pub use sequencer::{DispenseSequencer, build_queue, expand_units};
pub use validator::validate_cart;
