//! Allocation engine
//!
//! Applies FEFO allocation and return plans to the stock ledger and keeps
//! the per-line provenance in `sale_line_allocations`. Everything here runs
//! on the caller's transaction; callers lock the product's batches first
//! with [`stock::lock_product_batches`].

use sqlx::PgConnection;

use shared::{
    allocated_quantity, merge_allocations, plan_allocation, plan_fefo_return, plan_return,
    BatchAllocation,
};

use crate::error::AppResult;
use crate::services::stock;

/// Take `quantity` units of a product, soonest-expiring batches first.
///
/// Availability is checked against the whole product before any batch is
/// touched, so a shortage leaves the ledger unchanged.
pub async fn allocate(
    conn: &mut PgConnection,
    product_id: i64,
    quantity: i64,
) -> AppResult<Vec<BatchAllocation>> {
    let batches = stock::batches_for_product(&mut *conn, product_id).await?;
    let plan = plan_allocation(product_id, &batches, quantity)?;

    for allocation in &plan {
        stock::adjust_batch_quantity(&mut *conn, allocation.batch_id, -allocation.quantity).await?;
    }

    tracing::debug!(product_id, quantity, batches = plan.len(), "Allocated stock");
    Ok(plan)
}

/// Give `quantity` units of a product back to stock.
///
/// Units go back to the batches recorded in `recorded` (latest draw first).
/// Any amount beyond what was recorded falls back to FEFO order, capped per
/// batch by what it has had consumed.
pub async fn reverse(
    conn: &mut PgConnection,
    product_id: i64,
    quantity: i64,
    recorded: &[BatchAllocation],
) -> AppResult<Vec<BatchAllocation>> {
    let from_recorded = quantity.min(allocated_quantity(recorded));

    let mut plan = Vec::new();
    if from_recorded > 0 {
        plan = plan_return(recorded, from_recorded)?;
    }

    let untracked = quantity - from_recorded;
    if untracked > 0 {
        tracing::warn!(product_id, untracked, "Returning stock without recorded provenance");
        let batches = stock::batches_for_product(&mut *conn, product_id).await?;
        let fallback = plan_fefo_return(product_id, &batches, untracked)?;
        merge_allocations(&mut plan, &fallback);
    }

    for allocation in &plan {
        stock::adjust_batch_quantity(&mut *conn, allocation.batch_id, allocation.quantity).await?;
    }

    tracing::debug!(product_id, quantity, batches = plan.len(), "Returned stock");
    Ok(plan)
}

// ============================================================================
// Provenance
// ============================================================================

/// Recorded draws of a sale line in consumption order
pub async fn line_allocations(
    conn: &mut PgConnection,
    sale_line_id: i64,
) -> AppResult<Vec<BatchAllocation>> {
    let allocations = sqlx::query_as::<_, BatchAllocation>(
        r#"
        SELECT batch_id, quantity
        FROM sale_line_allocations
        WHERE sale_line_id = $1
        ORDER BY sequence
        "#,
    )
    .bind(sale_line_id)
    .fetch_all(conn)
    .await?;

    Ok(allocations)
}

/// Replace a sale line's recorded draws
pub async fn record_allocations(
    conn: &mut PgConnection,
    sale_line_id: i64,
    allocations: &[BatchAllocation],
) -> AppResult<()> {
    sqlx::query("DELETE FROM sale_line_allocations WHERE sale_line_id = $1")
        .bind(sale_line_id)
        .execute(&mut *conn)
        .await?;

    for (sequence, allocation) in allocations.iter().enumerate() {
        if allocation.quantity <= 0 {
            continue;
        }
        sqlx::query(
            r#"
            INSERT INTO sale_line_allocations (sale_line_id, batch_id, sequence, quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(sale_line_id)
        .bind(allocation.batch_id)
        .bind(sequence as i32)
        .bind(allocation.quantity)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
