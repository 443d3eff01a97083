//! Read-only report models

use serde::{Deserialize, Serialize};

/// Aggregate on-hand quantity for a product across all of its batches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockLevel {
    pub product_id: i64,
    pub product_name: String,
    pub batch_count: i64,
    pub total_quantity: i64,
}

/// Units sold of a product across all recorded sales
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductSales {
    pub product_id: i64,
    pub product_name: String,
    pub total_quantity: i64,
}
