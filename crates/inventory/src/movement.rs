use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, Entity, ProductId, StockMovementId};

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    /// Parse a direction tag case-insensitively (`In`, `OUT`, `in`, ...).
    /// Surrounding whitespace is not stripped.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            _ => Err(DomainError::InvalidMovementType(raw.to_string())),
        }
    }

    /// Normalized storage form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }

    /// Signed effect of moving `quantity` units in this direction.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            Self::In => quantity,
            Self::Out => -quantity,
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Calendar date of a movement (no time of day, no timezone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementDate(NaiveDate);

impl MovementDate {
    /// Parse a strict `YYYY-MM-DD` date.
    ///
    /// The shape is checked first (exactly four, two and two ASCII digits), then the
    /// value must be a real calendar date: `2024-02-30` is rejected.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let bytes = raw.as_bytes();
        let shape_ok = bytes.len() == 10
            && bytes.iter().enumerate().all(|(i, b)| match i {
                4 | 7 => *b == b'-',
                _ => b.is_ascii_digit(),
            });
        if !shape_ok {
            return Err(DomainError::InvalidDate(raw.to_string()));
        }

        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| DomainError::InvalidDate(raw.to_string()))
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl core::fmt::Display for MovementDate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for MovementDate {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

/// A validated movement that has not been written to the ledger yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockMovement {
    pub product_id: ProductId,
    pub quantity: i64,
    pub movement_type: MovementType,
    pub movement_date: MovementDate,
    pub note: String,
}

impl NewStockMovement {
    /// Build from already-typed parts; only the quantity still needs checking.
    pub fn new(
        product_id: ProductId,
        quantity: i64,
        movement_type: MovementType,
        movement_date: MovementDate,
        note: impl Into<String>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }
        Ok(Self {
            product_id,
            quantity,
            movement_type,
            movement_date,
            note: note.into(),
        })
    }

    /// Validate raw request values in order: quantity, movement type, date.
    pub fn parse(
        product_id: ProductId,
        quantity: i64,
        movement_type: &str,
        movement_date: &str,
        note: impl Into<String>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }
        let movement_type = MovementType::parse(movement_type)?;
        let movement_date = MovementDate::parse(movement_date)?;
        Self::new(product_id, quantity, movement_type, movement_date, note)
    }

    pub fn signed_effect(&self) -> i64 {
        self.movement_type.signed(self.quantity)
    }
}

/// An immutable ledger entry.
///
/// The ledger stores the unsigned quantity plus the direction tag; the signed
/// effect is derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: StockMovementId,
    /// Position in the ledger (strictly increasing in insertion order).
    pub sequence: u64,
    pub product_id: ProductId,
    pub quantity: i64,
    pub movement_type: MovementType,
    pub movement_date: MovementDate,
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn from_new(
        id: StockMovementId,
        sequence: u64,
        new: NewStockMovement,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sequence,
            product_id: new.product_id,
            quantity: new.quantity,
            movement_type: new.movement_type,
            movement_date: new.movement_date,
            note: new.note,
            recorded_at,
        }
    }

    pub fn signed_effect(&self) -> i64 {
        self.movement_type.signed(self.quantity)
    }
}

impl Entity for StockMovement {
    type Id = StockMovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
