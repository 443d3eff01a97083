//! Product and supplier catalog service

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use shared::{validate_name, validate_price_range, validate_product_price, Product, Supplier};

use crate::error::{AppError, AppResult};

const PRODUCT_COLUMNS: &str = "id, name, generic_name, manufacturer, dosage, price, supplier_id";

/// Look up a product on an existing connection
pub async fn find_product(conn: &mut PgConnection, product_id: i64) -> AppResult<Product> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products WHERE id = $1",
        PRODUCT_COLUMNS
    ))
    .bind(product_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))
}

/// Input for creating a supplier
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 255, message = "Supplier name is required"))]
    pub name: String,
    #[validate(length(max = 50, message = "Contact number is too long"))]
    pub contact_number: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub dosage: Option<String>,
    pub price: Decimal,
    pub supplier_id: i64,
}

/// Catalog service
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Suppliers
    // ========================================================================

    pub async fn create_supplier(&self, input: CreateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;
        validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;

        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (name, contact_number, email)
            VALUES ($1, $2, $3)
            RETURNING id, name, contact_number, email
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.contact_number)
        .bind(&input.email)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(supplier_id = supplier.id, "Supplier created");
        Ok(supplier)
    }

    pub async fn get_supplier(&self, supplier_id: i64) -> AppResult<Supplier> {
        sqlx::query_as::<_, Supplier>(
            "SELECT id, name, contact_number, email FROM suppliers WHERE id = $1",
        )
        .bind(supplier_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Supplier {}", supplier_id)))
    }

    pub async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, contact_number, email FROM suppliers ORDER BY name, id",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(suppliers)
    }

    // ========================================================================
    // Products
    // ========================================================================

    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;
        validate_product_price(input.price).map_err(|m| AppError::validation("price", m))?;

        // Surfaces a missing supplier as 404 rather than a foreign key error
        self.get_supplier(input.supplier_id).await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (name, generic_name, manufacturer, dosage, price, supplier_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.generic_name)
        .bind(&input.manufacturer)
        .bind(&input.dosage)
        .bind(input.price)
        .bind(input.supplier_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product_id = product.id, supplier_id = product.supplier_id, "Product created");
        Ok(product)
    }

    pub async fn get_product(&self, product_id: i64) -> AppResult<Product> {
        let mut conn = self.db.acquire().await?;
        find_product(&mut conn, product_id).await
    }

    pub async fn list_products(&self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products ORDER BY name, id",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    /// Products whose catalog price lies within `[min, max]`
    pub async fn products_by_price_range(&self, min: Decimal, max: Decimal) -> AppResult<Vec<Product>> {
        validate_price_range(min, max).map_err(|m| AppError::validation("min_price", m))?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE price BETWEEN $1 AND $2 ORDER BY price, name, id",
            PRODUCT_COLUMNS
        ))
        .bind(min)
        .bind(max)
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    pub async fn products_by_supplier(&self, supplier_id: i64) -> AppResult<Vec<Product>> {
        self.get_supplier(supplier_id).await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE supplier_id = $1 ORDER BY name, id",
            PRODUCT_COLUMNS
        ))
        .bind(supplier_id)
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }
}
