//! Sale orders domain module.
//!
//! This crate contains the sale-order state machine (`Pending -> Completed |
//! Cancelled`), implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage).

pub mod order;

pub use order::{OrderAction, OrderResolution, SaleOrder, SaleOrderStatus};
