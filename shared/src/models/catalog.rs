//! Product and supplier catalog models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A supplier of pharmaceutical products
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub contact_number: Option<String>,
    pub email: Option<String>,
}

/// A product carried by the pharmacy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    /// Strength and form, e.g. "500mg tablet"
    pub dosage: Option<String>,
    /// List price per unit
    pub price: Decimal,
    pub supplier_id: i64,
}
