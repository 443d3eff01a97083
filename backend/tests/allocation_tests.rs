//! Stock allocation tests
//!
//! Tests for FEFO allocation planning including:
//! - Allocated amounts sum to the requested quantity
//! - No batch is asked for more than it holds
//! - Shortages produce no plan at all
//! - Returns against recorded provenance restore batches exactly
//! - Sale totals are exact decimal sums

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    allocated_quantity, fefo_order, line_total, plan_allocation, plan_fefo_return, plan_return,
    sale_total, subtract_allocations, total_available, AllocationError, BatchAllocation,
    StockBatch,
};
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn batch(id: i64, quantity: i64, expiry: Option<NaiveDate>) -> StockBatch {
    StockBatch {
        id,
        product_id: 1,
        batch_number: Some(format!("LOT-{:03}", id)),
        quantity,
        received_quantity: quantity,
        expiry_date: expiry,
        received_at: Utc::now(),
    }
}

/// Apply a plan to a copy of the batches, as the ledger would
fn apply(batches: &[StockBatch], plan: &[BatchAllocation], sign: i64) -> Vec<StockBatch> {
    batches
        .iter()
        .map(|b| {
            let delta: i64 = plan
                .iter()
                .filter(|a| a.batch_id == b.id)
                .map(|a| a.quantity)
                .sum();
            StockBatch {
                quantity: b.quantity + sign * delta,
                ..b.clone()
            }
        })
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    /// FEFO: 5 from the January batch, 2 from the June batch, leaving [0, 8]
    #[test]
    fn test_fefo_example() {
        let batches = vec![batch(1, 5, date(2024, 1, 1)), batch(2, 10, date(2024, 6, 1))];

        let plan = plan_allocation(1, &batches, 7).unwrap();
        assert_eq!(plan, vec![BatchAllocation::new(1, 5), BatchAllocation::new(2, 2)]);

        let after = apply(&batches, &plan, -1);
        let quantities: Vec<i64> = after.iter().map(|b| b.quantity).collect();
        assert_eq!(quantities, vec![0, 8]);
    }

    /// Insertion order does not change the plan
    #[test]
    fn test_plan_independent_of_input_order() {
        let a = vec![
            batch(3, 4, None),
            batch(1, 2, date(2025, 3, 1)),
            batch(2, 6, date(2024, 12, 1)),
        ];
        let mut b = a.clone();
        b.reverse();

        assert_eq!(
            plan_allocation(1, &a, 9).unwrap(),
            plan_allocation(1, &b, 9).unwrap()
        );
        let ids: Vec<i64> = fefo_order(&a).iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    /// Delta on update is what gets requested, and what gets reported
    #[test]
    fn test_update_delta_shortage_reports_delta() {
        // Line goes from 3 to 5 with one unit left on hand
        let batches = vec![batch(1, 1, date(2024, 1, 1))];
        let err = plan_allocation(9, &batches, 5 - 3).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientStock {
                product_id: 9,
                available: 1,
                requested: 2,
            }
        );
    }

    /// Deleting a sale returns exactly what was drawn
    #[test]
    fn test_full_return_restores_batches() {
        let batches = vec![
            batch(1, 5, date(2024, 1, 1)),
            batch(2, 10, date(2024, 6, 1)),
            batch(3, 3, None),
        ];
        let plan = plan_allocation(1, &batches, 16).unwrap();
        let after_sale = apply(&batches, &plan, -1);

        let returned = plan_return(&plan, 16).unwrap();
        let after_delete = apply(&after_sale, &returned, 1);

        assert_eq!(after_delete, batches);
        assert!(subtract_allocations(&plan, &returned).is_empty());
    }

    /// Without provenance, returns never push a batch above what it received
    #[test]
    fn test_fefo_return_respects_received_quantity() {
        let batches = vec![batch(1, 5, date(2024, 1, 1)), batch(2, 10, date(2024, 6, 1))];
        let plan = plan_allocation(1, &batches, 7).unwrap();
        let after_sale = apply(&batches, &plan, -1);

        let returned = plan_fefo_return(1, &after_sale, 7).unwrap();
        let restored = apply(&after_sale, &returned, 1);

        for (before, after) in batches.iter().zip(&restored) {
            assert!(after.quantity <= before.received_quantity);
        }
        assert_eq!(total_available(&restored), total_available(&batches));
    }

    /// Sale total for a mixed basket
    #[test]
    fn test_sale_total_example() {
        let lines = vec![
            line_total(dec("3.49"), 3).unwrap(),
            line_total(dec("12.00"), 1).unwrap(),
            line_total(dec("0.35"), 20).unwrap(),
        ];
        assert_eq!(sale_total(lines), Some(dec("29.47")));
    }

    /// A price at the top of the decimal range cannot be multiplied out
    #[test]
    fn test_line_total_overflow_reported_not_panicking() {
        assert_eq!(line_total(Decimal::MAX, 2), None);
        assert_eq!(line_total(Decimal::MAX, 1), Some(Decimal::MAX));
        assert_eq!(sale_total(vec![Decimal::MAX, dec("0.01")]), None);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for generating optional expiry dates within a few years
    fn expiry_strategy() -> impl Strategy<Value = Option<NaiveDate>> {
        prop_oneof![
            1 => Just(None),
            4 => (0i64..1500).prop_map(|days| {
                NaiveDate::from_ymd_opt(2024, 1, 1).map(|d| d + chrono::Duration::days(days))
            }),
        ]
    }

    /// Strategy for generating a product's batches with distinct ids
    fn batches_strategy() -> impl Strategy<Value = Vec<StockBatch>> {
        prop::collection::vec((0i64..50, expiry_strategy()), 0..8).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (qty, expiry))| batch(i as i64 + 1, qty, expiry))
                .collect()
        })
    }

    /// Strategy for generating valid unit prices
    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100000i64).prop_map(|n| Decimal::new(n, 2)) // 0.01 to 1000.00
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Successful allocations take exactly the requested amount,
        /// never more than a batch holds
        #[test]
        fn prop_allocation_sums_to_request(
            batches in batches_strategy(),
            requested in 1i64..200
        ) {
            if let Ok(plan) = plan_allocation(1, &batches, requested) {
                prop_assert_eq!(allocated_quantity(&plan), requested);
                for allocation in &plan {
                    let source = batches.iter().find(|b| b.id == allocation.batch_id).unwrap();
                    prop_assert!(allocation.quantity > 0);
                    prop_assert!(allocation.quantity <= source.quantity);
                }
                let after = apply(&batches, &plan, -1);
                prop_assert!(after.iter().all(|b| b.quantity >= 0));
            }
        }

        /// Requests above the total on hand always fail with the exact numbers
        #[test]
        fn prop_overdraw_always_rejected(
            batches in batches_strategy(),
            extra in 1i64..100
        ) {
            let available = total_available(&batches);
            let requested = available + extra;
            let result = plan_allocation(7, &batches, requested);
            prop_assert_eq!(
                result,
                Err(AllocationError::InsufficientStock { product_id: 7, available, requested })
            );
        }

        /// Requests within the total on hand always succeed
        #[test]
        fn prop_sufficient_stock_always_allocates(
            batches in batches_strategy(),
            fraction in 1u32..=100
        ) {
            let available = total_available(&batches);
            prop_assume!(available > 0);
            let requested = (available * fraction as i64 / 100).max(1);
            prop_assert!(plan_allocation(1, &batches, requested).is_ok());
        }

        /// A batch is only touched once every earlier FEFO batch is empty
        #[test]
        fn prop_fefo_drains_in_order(
            batches in batches_strategy(),
            requested in 1i64..200
        ) {
            if let Ok(plan) = plan_allocation(1, &batches, requested) {
                let after = apply(&batches, &plan, -1);
                let ordered: Vec<i64> = fefo_order(&batches).iter().map(|b| b.id).collect();
                let last_touched = ordered
                    .iter()
                    .rposition(|id| plan.iter().any(|a| a.batch_id == *id));
                if let Some(last) = last_touched {
                    for id in &ordered[..last] {
                        let b = after.iter().find(|b| b.id == *id).unwrap();
                        prop_assert_eq!(b.quantity, 0);
                    }
                }
            }
        }

        /// Partial returns then the rest restore every batch
        #[test]
        fn prop_split_return_restores_exactly(
            batches in batches_strategy(),
            requested in 1i64..200,
            first_part in 1i64..200
        ) {
            if let Ok(plan) = plan_allocation(1, &batches, requested) {
                let after_sale = apply(&batches, &plan, -1);
                let first = first_part.min(requested);

                let returned = plan_return(&plan, first).unwrap();
                let left = subtract_allocations(&plan, &returned);
                prop_assert_eq!(allocated_quantity(&left), requested - first);

                let mut restored = apply(&after_sale, &returned, 1);
                if requested > first {
                    let rest = plan_return(&left, requested - first).unwrap();
                    restored = apply(&restored, &rest, 1);
                }
                prop_assert_eq!(restored, batches);
            }
        }

        /// Sale total equals the sum of line totals, exactly
        #[test]
        fn prop_sale_total_exact(
            lines in prop::collection::vec((price_strategy(), 1i64..1000), 1..20)
        ) {
            let totals: Vec<Decimal> = lines
                .iter()
                .map(|(p, q)| line_total(*p, *q).unwrap())
                .collect();
            let total = sale_total(totals.clone()).unwrap();

            let mut expected = Decimal::ZERO;
            for (price, quantity) in &lines {
                expected += *price * Decimal::from(*quantity);
            }
            prop_assert_eq!(total, expected);
            prop_assert_eq!(Some(total), sale_total(totals));
            prop_assert!(total.scale() <= 2);
        }
    }
}
