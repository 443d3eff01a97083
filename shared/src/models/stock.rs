//! Stock batch models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A received lot of a product with its own quantity and expiry date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockBatch {
    pub id: i64,
    pub product_id: i64,
    /// Supplier lot number; not unique across products or receipts
    pub batch_number: Option<String>,
    /// Units currently on hand, never negative
    pub quantity: i64,
    /// Units received into this batch over its lifetime
    pub received_quantity: i64,
    pub expiry_date: Option<NaiveDate>,
    pub received_at: DateTime<Utc>,
}

impl StockBatch {
    /// Units consumed from this batch that could be returned to it
    pub fn returnable(&self) -> i64 {
        (self.received_quantity - self.quantity).max(0)
    }
}

/// Quantity taken from (or returned to) a single batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BatchAllocation {
    pub batch_id: i64,
    pub quantity: i64,
}

impl BatchAllocation {
    pub fn new(batch_id: i64, quantity: i64) -> Self {
        Self { batch_id, quantity }
    }
}

/// Recorded provenance of a sale line: which batch it drew how much from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLineAllocation {
    pub sale_line_id: i64,
    pub batch_id: i64,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i64,
}
