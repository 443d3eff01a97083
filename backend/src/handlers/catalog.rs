//! HTTP handlers for supplier and product endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use shared::{Action, Product, Resource, Supplier};

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::catalog::{CatalogService, CreateProductInput, CreateSupplierInput};
use crate::services::stock::{ProductStock, StockService};
use crate::AppState;

#[derive(Deserialize)]
pub struct PriceRangeQuery {
    pub min_price: Decimal,
    pub max_price: Decimal,
}

/// Create a supplier
pub async fn create_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSupplierInput>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    check_permission(&current_user.0, Resource::Product, Action::Create)?;
    let service = CatalogService::new(state.db);
    let supplier = service.create_supplier(input).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

/// List all suppliers
pub async fn list_suppliers(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Supplier>>> {
    check_permission(&current_user.0, Resource::Product, Action::Read)?;
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_suppliers().await?))
}

/// Get a supplier by ID
pub async fn get_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<i64>,
) -> AppResult<Json<Supplier>> {
    check_permission(&current_user.0, Resource::Product, Action::Read)?;
    let service = CatalogService::new(state.db);
    Ok(Json(service.get_supplier(supplier_id).await?))
}

/// Products carried from a supplier
pub async fn get_supplier_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<i64>,
) -> AppResult<Json<Vec<Product>>> {
    check_permission(&current_user.0, Resource::Product, Action::Read)?;
    let service = CatalogService::new(state.db);
    Ok(Json(service.products_by_supplier(supplier_id).await?))
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    check_permission(&current_user.0, Resource::Product, Action::Create)?;
    let service = CatalogService::new(state.db);
    let product = service.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// List all products
pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    check_permission(&current_user.0, Resource::Product, Action::Read)?;
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_products().await?))
}

/// Get a product by ID
pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Product>> {
    check_permission(&current_user.0, Resource::Product, Action::Read)?;
    let service = CatalogService::new(state.db);
    Ok(Json(service.get_product(product_id).await?))
}

/// Products priced within a range, both ends included
pub async fn products_by_price_range(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PriceRangeQuery>,
) -> AppResult<Json<Vec<Product>>> {
    check_permission(&current_user.0, Resource::Product, Action::Read)?;
    let service = CatalogService::new(state.db);
    Ok(Json(
        service
            .products_by_price_range(query.min_price, query.max_price)
            .await?,
    ))
}

/// Batches of a product in FEFO order, with the total on hand
pub async fn get_product_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ProductStock>> {
    check_permission(&current_user.0, Resource::Stock, Action::Read)?;
    let service = StockService::new(state.db);
    Ok(Json(service.product_stock(product_id).await?))
}
