//! HTTP handlers for sale endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use shared::{Action, DateRange, Resource, Sale, SaleLineAllocation};

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::sale::{CreateSaleInput, SaleService, UpdateSaleInput};
use crate::AppState;

#[derive(Deserialize)]
pub struct DateRangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

fn sale_service(state: AppState) -> SaleService {
    SaleService::new(state.db, &state.config.stock)
}

/// Record a sale
pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<Sale>)> {
    check_permission(&current_user.0, Resource::Sale, Action::Create)?;
    let sale = sale_service(state).create_sale(input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// List all sales, newest first
pub async fn list_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Sale>>> {
    check_permission(&current_user.0, Resource::Sale, Action::Read)?;
    Ok(Json(sale_service(state).list_sales().await?))
}

/// Get a sale with its lines
pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<i64>,
) -> AppResult<Json<Sale>> {
    check_permission(&current_user.0, Resource::Sale, Action::Read)?;
    Ok(Json(sale_service(state).get_sale(sale_id).await?))
}

/// Update a sale and reconcile stock
pub async fn update_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<i64>,
    Json(input): Json<UpdateSaleInput>,
) -> AppResult<Json<Sale>> {
    check_permission(&current_user.0, Resource::Sale, Action::Update)?;
    Ok(Json(sale_service(state).update_sale(sale_id, input).await?))
}

/// Delete a sale and return its stock
pub async fn delete_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<i64>,
) -> AppResult<StatusCode> {
    check_permission(&current_user.0, Resource::Sale, Action::Delete)?;
    sale_service(state).delete_sale(sale_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Batches each line of a sale drew from
pub async fn get_sale_allocations(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<i64>,
) -> AppResult<Json<Vec<SaleLineAllocation>>> {
    check_permission(&current_user.0, Resource::Sale, Action::Read)?;
    Ok(Json(sale_service(state).sale_allocations(sale_id).await?))
}

/// Sales dated within an inclusive range
pub async fn sales_by_date_range(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<Sale>>> {
    check_permission(&current_user.0, Resource::Sale, Action::Read)?;
    let range = DateRange::new(query.start_date, query.end_date);
    Ok(Json(sale_service(state).sales_between(range).await?))
}

/// Sales for an exact customer name
pub async fn sales_by_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_name): Path<String>,
) -> AppResult<Json<Vec<Sale>>> {
    check_permission(&current_user.0, Resource::Sale, Action::Read)?;
    Ok(Json(sale_service(state).sales_by_customer(&customer_name).await?))
}
