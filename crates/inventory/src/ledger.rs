//! Ledger replay and reconciliation.

use serde::{Deserialize, Serialize};

use stockflow_core::ProductId;

use crate::movement::StockMovement;

/// Sum of the signed effects of `movements`, in the order given.
pub fn net_effect<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> i64 {
    movements.into_iter().map(StockMovement::signed_effect).sum()
}

/// Result of replaying a product's ledger against its current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub product_id: ProductId,
    pub opening_stock: i64,
    pub ledger_net: i64,
    pub entries: usize,
    /// `opening_stock + ledger_net`.
    pub expected_stock: i64,
    pub actual_stock: i64,
    pub consistent: bool,
}

impl Reconciliation {
    /// Replay `movements` (ledger order) from `opening_stock` and compare with `actual_stock`.
    ///
    /// Entries for other products are ignored.
    pub fn replay(
        product_id: ProductId,
        opening_stock: i64,
        actual_stock: i64,
        movements: &[StockMovement],
    ) -> Self {
        let own: Vec<&StockMovement> = movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .collect();
        let ledger_net = net_effect(own.iter().copied());
        let expected_stock = opening_stock + ledger_net;

        Self {
            product_id,
            opening_stock,
            ledger_net,
            entries: own.len(),
            expected_stock,
            actual_stock,
            consistent: expected_stock == actual_stock,
        }
    }

    /// Difference between what the ledger explains and what is on hand.
    pub fn drift(&self) -> i64 {
        self.actual_stock - self.expected_stock
    }
}
