//! Sale transaction service
//!
//! Creating, updating and deleting a sale each run as one database
//! transaction: the sale rows, every stock batch adjustment and the recorded
//! provenance commit together or not at all. Dropping the transaction on an
//! early `?` return rolls it back.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};

use shared::{
    line_total, merge_allocations, sale_total, subtract_allocations, validate_date_range,
    validate_payment_method, validate_quantity, validate_sale_has_lines, validate_unit_price,
    DateRange, Product, ProductSales, Sale, SaleLine, SaleLineAllocation,
};

use crate::config::StockConfig;
use crate::error::{AppError, AppResult};
use crate::services::{allocation, catalog::find_product, stock};

const SALE_COLUMNS: &str =
    "id, customer_name, sale_date, payment_method, total_amount, created_at, updated_at";

const LINE_SELECT: &str = r#"
    SELECT l.id, l.sale_id, l.product_id, p.name AS product_name,
           l.quantity, l.unit_price, l.line_total
    FROM sale_lines l
    JOIN products p ON p.id = l.product_id
"#;

/// Input for a line of a new sale
#[derive(Debug, Clone, Deserialize)]
pub struct SaleLineInput {
    pub product_id: i64,
    pub quantity: i64,
    /// Defaults to the product's list price
    pub unit_price: Option<Decimal>,
}

/// Input for recording a sale
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSaleInput {
    pub customer_name: Option<String>,
    /// Defaults to today (UTC)
    pub sale_date: Option<NaiveDate>,
    pub payment_method: String,
    pub lines: Vec<SaleLineInput>,
}

/// Change to an existing line, identified by its id
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSaleLineInput {
    pub id: i64,
    /// A different product reverses the old allocation and allocates anew
    pub product_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
}

/// Input for updating a sale; lines not listed are left as they are
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSaleInput {
    pub customer_name: Option<String>,
    pub sale_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub lines: Vec<UpdateSaleLineInput>,
}

/// Sale header row
#[derive(Debug, FromRow)]
struct SaleRow {
    id: i64,
    customer_name: Option<String>,
    sale_date: NaiveDate,
    payment_method: String,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, lines: Vec<SaleLine>) -> Sale {
        Sale {
            id: self.id,
            customer_name: self.customer_name,
            sale_date: self.sale_date,
            payment_method: self.payment_method,
            total_amount: self.total_amount,
            lines,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A validated line ready to be written
struct PricedLine {
    product_id: i64,
    quantity: i64,
    unit_price: Decimal,
    line_total: Decimal,
}

fn resolve_unit_price(requested: Option<Decimal>, product: &Product) -> AppResult<Decimal> {
    let unit_price = requested.unwrap_or(product.price);
    validate_unit_price(unit_price).map_err(|m| AppError::validation("unit_price", m))?;
    Ok(unit_price)
}

fn priced_line_total(unit_price: Decimal, quantity: i64) -> AppResult<Decimal> {
    line_total(unit_price, quantity)
        .ok_or_else(|| AppError::validation("unit_price", "Line total exceeds the supported amount range"))
}

fn checked_sale_total<I>(line_totals: I) -> AppResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    sale_total(line_totals)
        .ok_or_else(|| AppError::validation("lines", "Sale total exceeds the supported amount range"))
}

fn normalize_customer(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Sale service
#[derive(Clone)]
pub struct SaleService {
    db: PgPool,
    lock_timeout_ms: u64,
}

impl SaleService {
    pub fn new(db: PgPool, stock_config: &StockConfig) -> Self {
        Self {
            db,
            lock_timeout_ms: stock_config.lock_timeout_ms,
        }
    }

    /// Begin a transaction with a bounded wait on contended rows
    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Record a sale and allocate stock for every line
    pub async fn create_sale(&self, input: CreateSaleInput) -> AppResult<Sale> {
        validate_sale_has_lines(input.lines.len()).map_err(|m| AppError::validation("lines", m))?;
        validate_payment_method(&input.payment_method)
            .map_err(|m| AppError::validation("payment_method", m))?;
        for line in &input.lines {
            validate_quantity(line.quantity).map_err(|m| AppError::validation("quantity", m))?;
            if let Some(price) = line.unit_price {
                validate_unit_price(price).map_err(|m| AppError::validation("unit_price", m))?;
            }
        }

        let mut tx = self.begin().await?;

        let mut priced = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let product = find_product(&mut tx, line.product_id).await?;
            let unit_price = resolve_unit_price(line.unit_price, &product)?;
            priced.push(PricedLine {
                product_id: product.id,
                quantity: line.quantity,
                unit_price,
                line_total: priced_line_total(unit_price, line.quantity)?,
            });
        }
        let total = checked_sale_total(priced.iter().map(|l| l.line_total))?;

        let product_ids: Vec<i64> = priced.iter().map(|l| l.product_id).collect();
        stock::lock_product_batches(&mut tx, &product_ids).await?;

        let sale_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO sales (customer_name, sale_date, payment_method, total_amount)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(normalize_customer(input.customer_name))
        .bind(input.sale_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(input.payment_method.trim())
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;

        for (index, line) in priced.iter().enumerate() {
            let line_id = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO sale_lines (sale_id, line_number, product_id, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(sale_id)
            .bind(index as i32 + 1)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_total)
            .fetch_one(&mut *tx)
            .await?;

            let drawn = allocation::allocate(&mut tx, line.product_id, line.quantity).await?;
            allocation::record_allocations(&mut tx, line_id, &drawn).await?;
        }

        let sale = load_sale(&mut tx, sale_id).await?;
        tx.commit().await?;

        tracing::info!(sale_id, lines = sale.lines.len(), total = %sale.total_amount, "Sale created");
        Ok(sale)
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Update header fields and listed lines, reconciling stock per line
    pub async fn update_sale(&self, sale_id: i64, input: UpdateSaleInput) -> AppResult<Sale> {
        if let Some(method) = &input.payment_method {
            validate_payment_method(method)
                .map_err(|m| AppError::validation("payment_method", m))?;
        }
        let mut seen = HashSet::new();
        for line in &input.lines {
            validate_quantity(line.quantity).map_err(|m| AppError::validation("quantity", m))?;
            if let Some(price) = line.unit_price {
                validate_unit_price(price).map_err(|m| AppError::validation("unit_price", m))?;
            }
            if !seen.insert(line.id) {
                return Err(AppError::validation("lines", "Each sale line may appear only once"));
            }
        }

        let mut tx = self.begin().await?;
        lock_sale(&mut tx, sale_id).await?;
        let existing = sale_lines(&mut tx, sale_id).await?;

        // Resolve every change before any stock moves
        let mut changes = Vec::with_capacity(input.lines.len());
        let mut product_ids = Vec::new();
        for change in &input.lines {
            let current = existing
                .iter()
                .find(|l| l.id == change.id)
                .ok_or_else(|| AppError::NotFound(format!("Sale line {}", change.id)))?;

            let product_id = change.product_id.unwrap_or(current.product_id);
            let unit_price = if product_id == current.product_id {
                let price = change.unit_price.unwrap_or(current.unit_price);
                validate_unit_price(price).map_err(|m| AppError::validation("unit_price", m))?;
                price
            } else {
                let product = find_product(&mut tx, product_id).await?;
                resolve_unit_price(change.unit_price, &product)?
            };

            product_ids.push(current.product_id);
            product_ids.push(product_id);
            let amount = priced_line_total(unit_price, change.quantity)?;
            changes.push((current.clone(), product_id, change.quantity, unit_price, amount));
        }

        // The new total must be representable before any stock moves
        checked_sale_total(existing.iter().map(|line| {
            changes
                .iter()
                .find(|(current, ..)| current.id == line.id)
                .map_or(line.line_total, |(.., amount)| *amount)
        }))?;

        stock::lock_product_batches(&mut tx, &product_ids).await?;

        for (current, product_id, quantity, unit_price, amount) in changes {
            let recorded = allocation::line_allocations(&mut tx, current.id).await?;

            let remaining = if product_id != current.product_id {
                allocation::reverse(&mut tx, current.product_id, current.quantity, &recorded)
                    .await?;
                allocation::allocate(&mut tx, product_id, quantity).await?
            } else {
                let delta = quantity - current.quantity;
                if delta > 0 {
                    let drawn = allocation::allocate(&mut tx, product_id, delta).await?;
                    let mut combined = recorded;
                    merge_allocations(&mut combined, &drawn);
                    combined
                } else if delta < 0 {
                    let returned =
                        allocation::reverse(&mut tx, product_id, -delta, &recorded).await?;
                    subtract_allocations(&recorded, &returned)
                } else {
                    recorded
                }
            };
            allocation::record_allocations(&mut tx, current.id, &remaining).await?;

            sqlx::query(
                r#"
                UPDATE sale_lines
                SET product_id = $2, quantity = $3, unit_price = $4, line_total = $5
                WHERE id = $1
                "#,
            )
            .bind(current.id)
            .bind(product_id)
            .bind(quantity)
            .bind(unit_price)
            .bind(amount)
            .execute(&mut *tx)
            .await?;

            tracing::debug!(
                sale_id,
                line_id = current.id,
                old_quantity = current.quantity,
                new_quantity = quantity,
                "Sale line reconciled"
            );
        }

        let lines = sale_lines(&mut tx, sale_id).await?;
        let total = checked_sale_total(lines.iter().map(|l| l.line_total))?;

        sqlx::query(
            r#"
            UPDATE sales
            SET customer_name = COALESCE($2, customer_name),
                sale_date = COALESCE($3, sale_date),
                payment_method = COALESCE($4, payment_method),
                total_amount = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(sale_id)
        .bind(normalize_customer(input.customer_name))
        .bind(input.sale_date)
        .bind(input.payment_method.as_deref().map(str::trim))
        .bind(total)
        .execute(&mut *tx)
        .await?;

        let sale = load_sale(&mut tx, sale_id).await?;
        tx.commit().await?;

        tracing::info!(sale_id, total = %sale.total_amount, "Sale updated");
        Ok(sale)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Return every line's stock and remove the sale
    pub async fn delete_sale(&self, sale_id: i64) -> AppResult<()> {
        let mut tx = self.begin().await?;
        lock_sale(&mut tx, sale_id).await?;

        let lines = sale_lines(&mut tx, sale_id).await?;
        let product_ids: Vec<i64> = lines.iter().map(|l| l.product_id).collect();
        stock::lock_product_batches(&mut tx, &product_ids).await?;

        for line in &lines {
            let recorded = allocation::line_allocations(&mut tx, line.id).await?;
            allocation::reverse(&mut tx, line.product_id, line.quantity, &recorded).await?;
        }

        // Lines and provenance go with the sale via ON DELETE CASCADE
        sqlx::query("DELETE FROM sales WHERE id = $1")
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(sale_id, lines = lines.len(), "Sale deleted");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_sale(&self, sale_id: i64) -> AppResult<Sale> {
        let mut conn = self.db.acquire().await?;
        load_sale(&mut conn, sale_id).await
    }

    pub async fn list_sales(&self) -> AppResult<Vec<Sale>> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales ORDER BY sale_date DESC, id DESC",
            SALE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        self.with_lines(rows).await
    }

    /// Sales dated within the range, both ends included
    pub async fn sales_between(&self, range: DateRange) -> AppResult<Vec<Sale>> {
        validate_date_range(range.start, range.end)
            .map_err(|m| AppError::validation("start_date", m))?;

        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales WHERE sale_date BETWEEN $1 AND $2 ORDER BY sale_date, id",
            SALE_COLUMNS
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        self.with_lines(rows).await
    }

    /// Sales recorded under exactly this customer name
    pub async fn sales_by_customer(&self, customer_name: &str) -> AppResult<Vec<Sale>> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales WHERE customer_name = $1 ORDER BY sale_date DESC, id DESC",
            SALE_COLUMNS
        ))
        .bind(customer_name.trim())
        .fetch_all(&self.db)
        .await?;

        self.with_lines(rows).await
    }

    /// Batch provenance of every line of a sale
    pub async fn sale_allocations(&self, sale_id: i64) -> AppResult<Vec<SaleLineAllocation>> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM sales WHERE id = $1)")
            .bind(sale_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Sale {}", sale_id)));
        }

        let allocations = sqlx::query_as::<_, SaleLineAllocation>(
            r#"
            SELECT a.sale_line_id, a.batch_id, b.batch_number, b.expiry_date, a.quantity
            FROM sale_line_allocations a
            JOIN sale_lines l ON l.id = a.sale_line_id
            JOIN stock_batches b ON b.id = a.batch_id
            WHERE l.sale_id = $1
            ORDER BY l.line_number, a.sequence
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.db)
        .await?;

        Ok(allocations)
    }

    /// Products ranked by units sold
    pub async fn most_sold_products(&self, limit: i64) -> AppResult<Vec<ProductSales>> {
        if limit <= 0 {
            return Err(AppError::validation("limit", "Limit must be greater than 0"));
        }

        let ranking = sqlx::query_as::<_, ProductSales>(
            r#"
            SELECT p.id AS product_id, p.name AS product_name,
                   SUM(l.quantity)::BIGINT AS total_quantity
            FROM sale_lines l
            JOIN products p ON p.id = l.product_id
            GROUP BY p.id, p.name
            ORDER BY total_quantity DESC, p.id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(ranking)
    }

    async fn with_lines(&self, rows: Vec<SaleRow>) -> AppResult<Vec<Sale>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let lines = sqlx::query_as::<_, SaleLine>(&format!(
            "{} WHERE l.sale_id = ANY($1) ORDER BY l.sale_id, l.line_number",
            LINE_SELECT
        ))
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_sale: HashMap<i64, Vec<SaleLine>> = HashMap::new();
        for line in lines {
            by_sale.entry(line.sale_id).or_default().push(line);
        }

        let sales = rows
            .into_iter()
            .map(|row| {
                let own = by_sale.remove(&row.id).unwrap_or_default();
                row.into_sale(own)
            })
            .collect();

        Ok(sales)
    }
}

async fn lock_sale(conn: &mut PgConnection, sale_id: i64) -> AppResult<()> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM sales WHERE id = $1 FOR UPDATE")
        .bind(sale_id)
        .fetch_optional(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Sale {}", sale_id)))
}

async fn sale_lines(conn: &mut PgConnection, sale_id: i64) -> AppResult<Vec<SaleLine>> {
    let lines = sqlx::query_as::<_, SaleLine>(&format!(
        "{} WHERE l.sale_id = $1 ORDER BY l.line_number",
        LINE_SELECT
    ))
    .bind(sale_id)
    .fetch_all(conn)
    .await?;

    Ok(lines)
}

async fn load_sale(conn: &mut PgConnection, sale_id: i64) -> AppResult<Sale> {
    let row = sqlx::query_as::<_, SaleRow>(&format!(
        "SELECT {} FROM sales WHERE id = $1",
        SALE_COLUMNS
    ))
    .bind(sale_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Sale {}", sale_id)))?;

    let lines = sale_lines(conn, sale_id).await?;
    Ok(row.into_sale(lines))
}
