//! Inventory domain module.
//!
//! Stock movement vocabulary (direction, calendar date, ledger entries) and
//! ledger replay, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage).

pub mod ledger;
pub mod movement;

pub use ledger::{Reconciliation, net_effect};
pub use movement::{MovementDate, MovementType, NewStockMovement, StockMovement};
