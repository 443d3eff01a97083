//! Sale and sale line models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::totals::sale_total;

/// A recorded sale with its lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sale {
    pub id: i64,
    pub customer_name: Option<String>,
    pub sale_date: NaiveDate,
    pub payment_method: String,
    /// Always the sum of the line totals
    pub total_amount: Decimal,
    pub lines: Vec<SaleLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Total derived from the lines, independent of the stored amount
    pub fn computed_total(&self) -> Option<Decimal> {
        sale_total(self.lines.iter().map(|line| line.line_total))
    }

    /// Whether the stored total agrees with the lines
    pub fn is_balanced(&self) -> bool {
        self.computed_total() == Some(self.total_amount)
    }
}

/// A single product line of a sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn line(id: i64, quantity: i64, unit_price: &str, line_total: &str) -> SaleLine {
        SaleLine {
            id,
            sale_id: 1,
            product_id: 10 + id,
            product_name: format!("Product {}", id),
            quantity,
            unit_price: Decimal::from_str(unit_price).unwrap(),
            line_total: Decimal::from_str(line_total).unwrap(),
        }
    }

    fn sale(total: &str, lines: Vec<SaleLine>) -> Sale {
        let now = Utc::now();
        Sale {
            id: 1,
            customer_name: Some("Walk-in".to_string()),
            sale_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            payment_method: "cash".to_string(),
            total_amount: Decimal::from_str(total).unwrap(),
            lines,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_balanced_sale() {
        let s = sale(
            "31.47",
            vec![line(1, 3, "3.49", "10.47"), line(2, 2, "10.50", "21.00")],
        );
        assert!(s.is_balanced());
        assert_eq!(s.computed_total(), Decimal::from_str("31.47").ok());
    }

    #[test]
    fn test_unbalanced_sale_detected() {
        let s = sale("30.00", vec![line(1, 3, "3.49", "10.47")]);
        assert!(!s.is_balanced());
    }

    #[test]
    fn test_sale_serializes_amounts_as_strings() {
        let s = sale("10.47", vec![line(1, 3, "3.49", "10.47")]);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["total_amount"], "10.47");
        assert_eq!(json["lines"][0]["unit_price"], "3.49");
    }
}
