//! FEFO stock allocation planning
//!
//! Plans are computed from a snapshot of one product's batches and describe
//! how many units to take from (or give back to) each batch. Applying a plan
//! is the caller's job; the backend does it inside the same database
//! transaction that locked the batches the snapshot was read from.
//!
//! Ordering is First-Expired-First-Out: ascending expiry date, undated
//! batches last, ties broken by ascending batch id.

use std::cmp::Ordering;

use thiserror::Error;

use crate::models::{BatchAllocation, StockBatch};

/// Errors raised while planning an allocation or a return
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        available: i64,
        requested: i64,
    },

    #[error("Quantity must be greater than 0, got {0}")]
    InvalidQuantity(i64),

    #[error("No stock batches recorded for product {0}")]
    NoBatches(i64),

    #[error("Cannot return {requested} units, only {recorded} were allocated")]
    ReturnExceedsAllocation { requested: i64, recorded: i64 },
}

/// FEFO comparison between two batches
pub fn fefo_cmp(a: &StockBatch, b: &StockBatch) -> Ordering {
    let by_expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry.then_with(|| a.id.cmp(&b.id))
}

/// Batches in consumption order
pub fn fefo_order(batches: &[StockBatch]) -> Vec<&StockBatch> {
    let mut ordered: Vec<&StockBatch> = batches.iter().collect();
    ordered.sort_by(|a, b| fefo_cmp(a, b));
    ordered
}

/// Sum of on-hand quantity across batches
pub fn total_available(batches: &[StockBatch]) -> i64 {
    batches.iter().map(|b| b.quantity.max(0)).sum()
}

/// Sum of the quantities in an allocation list
pub fn allocated_quantity(allocations: &[BatchAllocation]) -> i64 {
    allocations.iter().map(|a| a.quantity).sum()
}

/// Plan taking `requested` units from a product's batches.
///
/// The availability check runs before anything is planned, so a shortage
/// never yields a partial plan.
pub fn plan_allocation(
    product_id: i64,
    batches: &[StockBatch],
    requested: i64,
) -> Result<Vec<BatchAllocation>, AllocationError> {
    if requested <= 0 {
        return Err(AllocationError::InvalidQuantity(requested));
    }

    let available = total_available(batches);
    if available < requested {
        return Err(AllocationError::InsufficientStock {
            product_id,
            available,
            requested,
        });
    }

    let mut remaining = requested;
    let mut plan = Vec::new();
    for batch in fefo_order(batches) {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.quantity);
        if take > 0 {
            plan.push(BatchAllocation::new(batch.id, take));
            remaining -= take;
        }
    }

    Ok(plan)
}

/// Plan returning `amount` units against recorded provenance.
///
/// `recorded` must be in consumption order. The most recently consumed
/// units go back first, so a partial return leaves the earliest-expiring
/// draws in place and a full return restores every batch exactly.
pub fn plan_return(
    recorded: &[BatchAllocation],
    amount: i64,
) -> Result<Vec<BatchAllocation>, AllocationError> {
    if amount <= 0 {
        return Err(AllocationError::InvalidQuantity(amount));
    }

    let total = allocated_quantity(recorded);
    if amount > total {
        return Err(AllocationError::ReturnExceedsAllocation {
            requested: amount,
            recorded: total,
        });
    }

    let mut remaining = amount;
    let mut plan = Vec::new();
    for allocation in recorded.iter().rev() {
        if remaining == 0 {
            break;
        }
        let give = remaining.min(allocation.quantity);
        if give > 0 {
            plan.push(BatchAllocation::new(allocation.batch_id, give));
            remaining -= give;
        }
    }

    Ok(plan)
}

/// Plan returning `amount` units when no provenance was recorded.
///
/// Walks the batches in FEFO order and refills each one up to the quantity
/// it has had consumed, so no batch ends above what it received. Whatever
/// cannot be placed that way goes to the last batch in FEFO order, keeping
/// the product's aggregate quantity exact.
pub fn plan_fefo_return(
    product_id: i64,
    batches: &[StockBatch],
    amount: i64,
) -> Result<Vec<BatchAllocation>, AllocationError> {
    if amount <= 0 {
        return Err(AllocationError::InvalidQuantity(amount));
    }

    let ordered = fefo_order(batches);
    let last = match ordered.last() {
        Some(batch) => batch.id,
        None => return Err(AllocationError::NoBatches(product_id)),
    };

    let mut remaining = amount;
    let mut plan: Vec<BatchAllocation> = Vec::new();
    for batch in &ordered {
        if remaining == 0 {
            break;
        }
        let give = remaining.min(batch.returnable());
        if give > 0 {
            plan.push(BatchAllocation::new(batch.id, give));
            remaining -= give;
        }
    }

    if remaining > 0 {
        merge_allocations(&mut plan, &[BatchAllocation::new(last, remaining)]);
    }

    Ok(plan)
}

/// Add `added` into `into`, combining entries for the same batch
pub fn merge_allocations(into: &mut Vec<BatchAllocation>, added: &[BatchAllocation]) {
    for allocation in added {
        match into.iter_mut().find(|a| a.batch_id == allocation.batch_id) {
            Some(existing) => existing.quantity += allocation.quantity,
            None => into.push(*allocation),
        }
    }
}

/// Remove `returned` from `recorded`, dropping entries that reach zero
pub fn subtract_allocations(
    recorded: &[BatchAllocation],
    returned: &[BatchAllocation],
) -> Vec<BatchAllocation> {
    recorded
        .iter()
        .map(|allocation| {
            let given_back: i64 = returned
                .iter()
                .filter(|r| r.batch_id == allocation.batch_id)
                .map(|r| r.quantity)
                .sum();
            BatchAllocation::new(allocation.batch_id, allocation.quantity - given_back)
        })
        .filter(|allocation| allocation.quantity > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn batch(id: i64, quantity: i64, expiry: Option<(i32, u32, u32)>) -> StockBatch {
        StockBatch {
            id,
            product_id: 1,
            batch_number: Some(format!("B-{}", id)),
            quantity,
            received_quantity: quantity,
            expiry_date: expiry.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            received_at: Utc::now(),
        }
    }

    fn consumed(mut b: StockBatch, taken: i64) -> StockBatch {
        b.quantity -= taken;
        b
    }

    #[test]
    fn test_fefo_takes_soonest_expiry_first() {
        let batches = vec![
            batch(2, 10, Some((2024, 6, 1))),
            batch(1, 5, Some((2024, 1, 1))),
        ];
        let plan = plan_allocation(1, &batches, 7).unwrap();
        assert_eq!(
            plan,
            vec![BatchAllocation::new(1, 5), BatchAllocation::new(2, 2)]
        );
    }

    #[test]
    fn test_undated_batches_last() {
        let batches = vec![
            batch(1, 4, None),
            batch(2, 4, Some((2030, 1, 1))),
        ];
        let plan = plan_allocation(1, &batches, 5).unwrap();
        assert_eq!(
            plan,
            vec![BatchAllocation::new(2, 4), BatchAllocation::new(1, 1)]
        );
    }

    #[test]
    fn test_equal_expiry_breaks_tie_by_id() {
        let batches = vec![
            batch(9, 3, Some((2025, 5, 5))),
            batch(4, 3, Some((2025, 5, 5))),
        ];
        let plan = plan_allocation(1, &batches, 4).unwrap();
        assert_eq!(
            plan,
            vec![BatchAllocation::new(4, 3), BatchAllocation::new(9, 1)]
        );
    }

    #[test]
    fn test_empty_batches_are_skipped() {
        let batches = vec![
            batch(1, 0, Some((2024, 1, 1))),
            batch(2, 6, Some((2024, 2, 1))),
        ];
        let plan = plan_allocation(1, &batches, 6).unwrap();
        assert_eq!(plan, vec![BatchAllocation::new(2, 6)]);
    }

    #[test]
    fn test_insufficient_stock_reports_numbers() {
        let batches = vec![batch(1, 2, None), batch(2, 3, None)];
        let err = plan_allocation(42, &batches, 6).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientStock {
                product_id: 42,
                available: 5,
                requested: 6,
            }
        );
    }

    #[test]
    fn test_no_batches_is_zero_available() {
        assert_eq!(total_available(&[]), 0);
        let err = plan_allocation(1, &[], 1).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::InsufficientStock { available: 0, .. }
        ));
    }

    #[test]
    fn test_non_positive_request_rejected() {
        let batches = vec![batch(1, 5, None)];
        assert_eq!(
            plan_allocation(1, &batches, 0),
            Err(AllocationError::InvalidQuantity(0))
        );
        assert_eq!(
            plan_allocation(1, &batches, -3),
            Err(AllocationError::InvalidQuantity(-3))
        );
    }

    #[test]
    fn test_return_undoes_latest_draw_first() {
        let recorded = vec![BatchAllocation::new(1, 5), BatchAllocation::new(2, 2)];
        let plan = plan_return(&recorded, 3).unwrap();
        assert_eq!(
            plan,
            vec![BatchAllocation::new(2, 2), BatchAllocation::new(1, 1)]
        );
        let left = subtract_allocations(&recorded, &plan);
        assert_eq!(left, vec![BatchAllocation::new(1, 4)]);
    }

    #[test]
    fn test_full_return_restores_exactly() {
        let recorded = vec![BatchAllocation::new(1, 5), BatchAllocation::new(2, 2)];
        let plan = plan_return(&recorded, 7).unwrap();
        assert_eq!(allocated_quantity(&plan), 7);
        assert!(subtract_allocations(&recorded, &plan).is_empty());
    }

    #[test]
    fn test_return_more_than_recorded_rejected() {
        let recorded = vec![BatchAllocation::new(1, 2)];
        assert_eq!(
            plan_return(&recorded, 3),
            Err(AllocationError::ReturnExceedsAllocation {
                requested: 3,
                recorded: 2,
            })
        );
    }

    #[test]
    fn test_fefo_return_capped_by_consumed() {
        let batches = vec![
            consumed(batch(1, 5, Some((2024, 1, 1))), 5),
            consumed(batch(2, 10, Some((2024, 6, 1))), 2),
        ];
        let plan = plan_fefo_return(1, &batches, 6).unwrap();
        assert_eq!(
            plan,
            vec![BatchAllocation::new(1, 5), BatchAllocation::new(2, 1)]
        );
    }

    #[test]
    fn test_fefo_return_overflow_goes_to_last_batch() {
        let batches = vec![
            consumed(batch(1, 5, Some((2024, 1, 1))), 1),
            batch(2, 10, None),
        ];
        let plan = plan_fefo_return(1, &batches, 4).unwrap();
        assert_eq!(
            plan,
            vec![BatchAllocation::new(1, 1), BatchAllocation::new(2, 3)]
        );
        assert_eq!(allocated_quantity(&plan), 4);
    }

    #[test]
    fn test_fefo_return_without_batches() {
        assert_eq!(
            plan_fefo_return(7, &[], 1),
            Err(AllocationError::NoBatches(7))
        );
    }

    #[test]
    fn test_merge_allocations_combines_batches() {
        let mut recorded = vec![BatchAllocation::new(1, 2)];
        merge_allocations(
            &mut recorded,
            &[BatchAllocation::new(1, 3), BatchAllocation::new(4, 1)],
        );
        assert_eq!(
            recorded,
            vec![BatchAllocation::new(1, 5), BatchAllocation::new(4, 1)]
        );
    }
}
