use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use stockflow_core::ProductId;
use stockflow_inventory::{NewStockMovement, StockMovement};

use crate::error::StoreResult;
use crate::store::{StockStore, StockTransaction};

/// Raw movement request as it arrives from the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub product_id: ProductId,
    pub quantity: i64,
    pub movement_type: String,
    pub movement_date: String,
    #[serde(default)]
    pub note: String,
}

/// Outcome of a recorded movement: the ledger entry plus the resulting stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMovement {
    pub movement: StockMovement,
    pub stock_quantity: i64,
}

/// Records manual stock movements (restocks, write-offs, corrections).
#[derive(Debug, Clone)]
pub struct StockMovementService<S> {
    store: S,
}

impl<S: StockStore> StockMovementService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate, adjust stock and append the ledger entry in one transaction.
    ///
    /// Validation (quantity, then type, then date) happens before any storage
    /// access. An `InsufficientStock` refusal writes nothing.
    #[instrument(
        skip(self, request),
        fields(product_id = %request.product_id, quantity = request.quantity),
        err
    )]
    pub async fn record_movement(&self, request: RecordMovement) -> StoreResult<RecordedMovement> {
        let movement = NewStockMovement::parse(
            request.product_id,
            request.quantity,
            &request.movement_type,
            &request.movement_date,
            request.note,
        )?;

        let mut tx = self.store.begin().await?;
        let recorded = apply_movement(tx.as_mut(), movement).await?;
        tx.commit().await?;

        info!(
            movement_id = %recorded.movement.id,
            movement_type = %recorded.movement.movement_type,
            stock_quantity = recorded.stock_quantity,
            "stock movement recorded"
        );
        Ok(recorded)
    }
}

/// Adjust-then-append inside a caller-owned transaction.
///
/// This is the one path by which stock changes get ledgered; the sale order
/// lifecycle reuses it so its entries are indistinguishable from manual ones.
pub(crate) async fn apply_movement(
    tx: &mut dyn StockTransaction,
    movement: NewStockMovement,
) -> StoreResult<RecordedMovement> {
    let stock_quantity = tx
        .adjust_stock(movement.product_id, movement.signed_effect())
        .await?;
    let movement = tx.append_movement(movement).await?;
    debug!(sequence = movement.sequence, stock_quantity, "ledger entry appended");
    Ok(RecordedMovement {
        movement,
        stock_quantity,
    })
}
