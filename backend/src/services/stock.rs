//! Stock ledger and batch management
//!
//! The free functions in this module operate on a single connection so they
//! can run inside a sale transaction. [`StockService`] wraps them for the
//! batch CRUD and report endpoints.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use shared::{
    validate_batch_number, validate_date_range, validate_quantity, validate_threshold, DateRange,
    StockBatch, StockLevel,
};

use crate::error::{AppError, AppResult};
use crate::services::catalog::find_product;

const BATCH_COLUMNS: &str =
    "id, product_id, batch_number, quantity, received_quantity, expiry_date, received_at";

// ============================================================================
// Ledger operations
// ============================================================================

/// Sum of on-hand quantity for a product; zero when it has no batches
pub async fn total_available(conn: &mut PgConnection, product_id: i64) -> AppResult<i64> {
    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(quantity), 0)::BIGINT
        FROM stock_batches
        WHERE product_id = $1
        "#,
    )
    .bind(product_id)
    .fetch_one(conn)
    .await?;

    Ok(total)
}

/// A product's batches in FEFO order
pub async fn batches_for_product(
    conn: &mut PgConnection,
    product_id: i64,
) -> AppResult<Vec<StockBatch>> {
    let batches = sqlx::query_as::<_, StockBatch>(&format!(
        r#"
        SELECT {}
        FROM stock_batches
        WHERE product_id = $1
        ORDER BY expiry_date ASC NULLS LAST, id ASC
        "#,
        BATCH_COLUMNS
    ))
    .bind(product_id)
    .fetch_all(conn)
    .await?;

    Ok(batches)
}

/// Lock every batch of the given products for the rest of the transaction.
///
/// Rows are locked in `(product_id, id)` order regardless of the order the
/// products were passed in, so two transactions touching overlapping
/// products always queue instead of deadlocking.
pub async fn lock_product_batches(
    conn: &mut PgConnection,
    product_ids: &[i64],
) -> AppResult<Vec<StockBatch>> {
    let mut ids = product_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let batches = sqlx::query_as::<_, StockBatch>(&format!(
        r#"
        SELECT {}
        FROM stock_batches
        WHERE product_id = ANY($1)
        ORDER BY product_id, id
        FOR UPDATE
        "#,
        BATCH_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    tracing::debug!(products = ?ids, batches = batches.len(), "Locked stock batches");
    Ok(batches)
}

/// Apply `delta` to a batch and return its new quantity.
///
/// The update is conditional on the result staying non-negative, so it can
/// never overdraw a batch even without a prior lock.
pub async fn adjust_batch_quantity(
    conn: &mut PgConnection,
    batch_id: i64,
    delta: i64,
) -> AppResult<i64> {
    let updated = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE stock_batches
        SET quantity = quantity + $2
        WHERE id = $1 AND quantity + $2 >= 0
        RETURNING quantity
        "#,
    )
    .bind(batch_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(quantity) = updated {
        return Ok(quantity);
    }

    let current = sqlx::query_as::<_, (i64, i64)>(
        "SELECT product_id, quantity FROM stock_batches WHERE id = $1",
    )
    .bind(batch_id)
    .fetch_optional(&mut *conn)
    .await?;

    match current {
        Some((product_id, available)) => Err(AppError::InsufficientStock {
            product_id,
            available,
            requested: -delta,
        }),
        None => Err(AppError::NotFound(format!("Stock batch {}", batch_id))),
    }
}

async fn fetch_batch(conn: &mut PgConnection, batch_id: i64) -> AppResult<StockBatch> {
    sqlx::query_as::<_, StockBatch>(&format!(
        "SELECT {} FROM stock_batches WHERE id = $1",
        BATCH_COLUMNS
    ))
    .bind(batch_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Stock batch {}", batch_id)))
}

// ============================================================================
// Batch management
// ============================================================================

/// Input for receiving a new batch
#[derive(Debug, Deserialize)]
pub struct ReceiveBatchInput {
    pub product_id: i64,
    pub batch_number: Option<String>,
    pub quantity: i64,
    pub expiry_date: Option<NaiveDate>,
}

/// Input for adding units to an existing batch
#[derive(Debug, Deserialize)]
pub struct RestockInput {
    pub quantity: i64,
}

/// Metadata corrections; absent fields are left unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateBatchInput {
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    /// Makes the batch undated; may not be combined with `expiry_date`
    #[serde(default)]
    pub clear_expiry_date: bool,
}

/// A product's batches together with their aggregate quantity
#[derive(Debug, Clone, Serialize)]
pub struct ProductStock {
    pub product_id: i64,
    pub total_available: i64,
    pub batches: Vec<StockBatch>,
}

/// Service for stock batches and stock reports
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

impl StockService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a newly received batch
    pub async fn receive_batch(&self, input: ReceiveBatchInput) -> AppResult<StockBatch> {
        validate_quantity(input.quantity).map_err(|m| AppError::validation("quantity", m))?;

        let mut conn = self.db.acquire().await?;
        find_product(&mut conn, input.product_id).await?;

        let batch = sqlx::query_as::<_, StockBatch>(&format!(
            r#"
            INSERT INTO stock_batches (product_id, batch_number, quantity, received_quantity, expiry_date)
            VALUES ($1, $2, $3, $3, $4)
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(input.product_id)
        .bind(input.batch_number.as_deref().map(str::trim))
        .bind(input.quantity)
        .bind(input.expiry_date)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(
            batch_id = batch.id,
            product_id = batch.product_id,
            quantity = batch.quantity,
            "Stock batch received"
        );
        Ok(batch)
    }

    pub async fn get_batch(&self, batch_id: i64) -> AppResult<StockBatch> {
        let mut conn = self.db.acquire().await?;
        fetch_batch(&mut conn, batch_id).await
    }

    pub async fn list_batches(&self) -> AppResult<Vec<StockBatch>> {
        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {} FROM stock_batches ORDER BY product_id, expiry_date ASC NULLS LAST, id",
            BATCH_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(batches)
    }

    /// Every batch carrying exactly this lot number, across products
    pub async fn batches_by_number(&self, batch_number: &str) -> AppResult<Vec<StockBatch>> {
        validate_batch_number(batch_number).map_err(|m| AppError::validation("batch_number", m))?;

        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            r#"
            SELECT {}
            FROM stock_batches
            WHERE batch_number = $1
            ORDER BY product_id, expiry_date ASC NULLS LAST, id
            "#,
            BATCH_COLUMNS
        ))
        .bind(batch_number.trim())
        .fetch_all(&self.db)
        .await?;

        Ok(batches)
    }

    /// Batches of one product in FEFO order with their total
    pub async fn product_stock(&self, product_id: i64) -> AppResult<ProductStock> {
        let mut conn = self.db.acquire().await?;
        find_product(&mut conn, product_id).await?;

        let batches = batches_for_product(&mut conn, product_id).await?;
        let total_available = total_available(&mut conn, product_id).await?;

        Ok(ProductStock {
            product_id,
            total_available,
            batches,
        })
    }

    /// Add received units to an existing batch
    pub async fn restock_batch(&self, batch_id: i64, input: RestockInput) -> AppResult<StockBatch> {
        validate_quantity(input.quantity).map_err(|m| AppError::validation("quantity", m))?;

        let batch = sqlx::query_as::<_, StockBatch>(&format!(
            r#"
            UPDATE stock_batches
            SET quantity = quantity + $2, received_quantity = received_quantity + $2
            WHERE id = $1
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(batch_id)
        .bind(input.quantity)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stock batch {}", batch_id)))?;

        tracing::info!(batch_id, added = input.quantity, quantity = batch.quantity, "Stock batch restocked");
        Ok(batch)
    }

    /// Correct batch number or expiry date without touching quantities
    pub async fn set_batch_details(
        &self,
        batch_id: i64,
        input: UpdateBatchInput,
    ) -> AppResult<StockBatch> {
        if input.clear_expiry_date && input.expiry_date.is_some() {
            return Err(AppError::validation(
                "expiry_date",
                "expiry_date cannot be set and cleared in the same request",
            ));
        }

        let batch = sqlx::query_as::<_, StockBatch>(&format!(
            r#"
            UPDATE stock_batches
            SET batch_number = COALESCE($2, batch_number),
                expiry_date = CASE WHEN $4 THEN NULL ELSE COALESCE($3, expiry_date) END
            WHERE id = $1
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(batch_id)
        .bind(input.batch_number.as_deref().map(str::trim))
        .bind(input.expiry_date)
        .bind(input.clear_expiry_date)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stock batch {}", batch_id)))?;

        Ok(batch)
    }

    /// Delete a batch that no sale has drawn from
    pub async fn delete_batch(&self, batch_id: i64) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let referenced = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM sale_line_allocations WHERE batch_id = $1)",
        )
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        if referenced {
            return Err(AppError::Conflict {
                resource: "stock_batch".to_string(),
                message: format!("Stock batch {} has been sold from and cannot be deleted", batch_id),
            });
        }

        let result = sqlx::query("DELETE FROM stock_batches WHERE id = $1")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Stock batch {}", batch_id)));
        }

        tx.commit().await?;
        tracing::info!(batch_id, "Stock batch deleted");
        Ok(())
    }

    // ========================================================================
    // Reports
    // ========================================================================

    /// Batches at or below `threshold` units
    pub async fn low_stock(&self, threshold: i64) -> AppResult<Vec<StockBatch>> {
        validate_threshold(threshold).map_err(|m| AppError::validation("threshold", m))?;

        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {} FROM stock_batches WHERE quantity <= $1 ORDER BY quantity, id",
            BATCH_COLUMNS
        ))
        .bind(threshold)
        .fetch_all(&self.db)
        .await?;

        Ok(batches)
    }

    /// Batches with stock on hand that expire within the range
    pub async fn expiring_between(&self, range: DateRange) -> AppResult<Vec<StockBatch>> {
        validate_date_range(range.start, range.end)
            .map_err(|m| AppError::validation("start_date", m))?;

        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            r#"
            SELECT {}
            FROM stock_batches
            WHERE expiry_date BETWEEN $1 AND $2 AND quantity > 0
            ORDER BY expiry_date, id
            "#,
            BATCH_COLUMNS
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(batches)
    }

    /// Batches expiring within the configured warning window from today
    pub async fn expiring_soon(&self, warning_days: i64) -> AppResult<Vec<StockBatch>> {
        let today = Utc::now().date_naive();
        let end = today + chrono::Duration::days(warning_days.max(0));
        self.expiring_between(DateRange::new(today, end)).await
    }

    /// Batches with stock on hand whose expiry date is before `date`
    pub async fn expired_before(&self, date: NaiveDate) -> AppResult<Vec<StockBatch>> {
        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            r#"
            SELECT {}
            FROM stock_batches
            WHERE expiry_date < $1 AND quantity > 0
            ORDER BY expiry_date, id
            "#,
            BATCH_COLUMNS
        ))
        .bind(date)
        .fetch_all(&self.db)
        .await?;

        Ok(batches)
    }

    /// Per-product totals across all batches, including products with none
    pub async fn stock_levels(&self) -> AppResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT p.id AS product_id,
                   p.name AS product_name,
                   COUNT(b.id)::BIGINT AS batch_count,
                   COALESCE(SUM(b.quantity), 0)::BIGINT AS total_quantity
            FROM products p
            LEFT JOIN stock_batches b ON b.product_id = p.id
            GROUP BY p.id, p.name
            ORDER BY p.name, p.id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(levels)
    }
}
