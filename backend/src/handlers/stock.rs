//! HTTP handlers for stock batch endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use shared::{Action, DateRange, Resource, StockBatch, StockLevel};

use crate::error::{AppError, AppResult};
use crate::middleware::{check_permission, CurrentUser};
use crate::services::stock::{ReceiveBatchInput, RestockInput, StockService, UpdateBatchInput};
use crate::AppState;

#[derive(Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i64>,
}

#[derive(Deserialize)]
pub struct ExpiringQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct ExpiredQuery {
    pub before: Option<NaiveDate>,
}

/// Receive a new stock batch
pub async fn receive_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ReceiveBatchInput>,
) -> AppResult<(StatusCode, Json<StockBatch>)> {
    check_permission(&current_user.0, Resource::Stock, Action::Update)?;
    let service = StockService::new(state.db);
    let batch = service.receive_batch(input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// List all stock batches
pub async fn list_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<StockBatch>>> {
    check_permission(&current_user.0, Resource::Stock, Action::Read)?;
    let service = StockService::new(state.db);
    Ok(Json(service.list_batches().await?))
}

/// Get a stock batch by ID
pub async fn get_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<i64>,
) -> AppResult<Json<StockBatch>> {
    check_permission(&current_user.0, Resource::Stock, Action::Read)?;
    let service = StockService::new(state.db);
    Ok(Json(service.get_batch(batch_id).await?))
}

/// Batches carrying a lot number, for recalls
pub async fn batches_by_number(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_number): Path<String>,
) -> AppResult<Json<Vec<StockBatch>>> {
    check_permission(&current_user.0, Resource::Stock, Action::Read)?;
    let service = StockService::new(state.db);
    Ok(Json(service.batches_by_number(&batch_number).await?))
}

/// Correct batch number or expiry date
pub async fn update_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<i64>,
    Json(input): Json<UpdateBatchInput>,
) -> AppResult<Json<StockBatch>> {
    check_permission(&current_user.0, Resource::Stock, Action::Update)?;
    let service = StockService::new(state.db);
    Ok(Json(service.set_batch_details(batch_id, input).await?))
}

/// Add received units to a batch
pub async fn restock_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<i64>,
    Json(input): Json<RestockInput>,
) -> AppResult<Json<StockBatch>> {
    check_permission(&current_user.0, Resource::Stock, Action::Update)?;
    let service = StockService::new(state.db);
    Ok(Json(service.restock_batch(batch_id, input).await?))
}

/// Delete a batch nothing has been sold from
pub async fn delete_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<i64>,
) -> AppResult<StatusCode> {
    check_permission(&current_user.0, Resource::Stock, Action::Update)?;
    let service = StockService::new(state.db);
    service.delete_batch(batch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Batches at or below a threshold (configured default when absent)
pub async fn low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<Vec<StockBatch>>> {
    check_permission(&current_user.0, Resource::Stock, Action::Read)?;
    let threshold = query
        .threshold
        .unwrap_or(state.config.stock.low_stock_threshold);
    let service = StockService::new(state.db);
    Ok(Json(service.low_stock(threshold).await?))
}

/// Batches expiring within a date range, or within the warning window
pub async fn expiring(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ExpiringQuery>,
) -> AppResult<Json<Vec<StockBatch>>> {
    check_permission(&current_user.0, Resource::Stock, Action::Read)?;
    let warning_days = state.config.stock.expiry_warning_days;
    let service = StockService::new(state.db);

    let batches = match (query.start_date, query.end_date) {
        (Some(start), Some(end)) => service.expiring_between(DateRange::new(start, end)).await?,
        (None, None) => service.expiring_soon(warning_days).await?,
        _ => {
            return Err(AppError::validation(
                "end_date",
                "start_date and end_date must be given together",
            ))
        }
    };
    Ok(Json(batches))
}

/// Batches past expiry that still hold stock
pub async fn expired(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ExpiredQuery>,
) -> AppResult<Json<Vec<StockBatch>>> {
    check_permission(&current_user.0, Resource::Stock, Action::Read)?;
    let before = query.before.unwrap_or_else(|| Utc::now().date_naive());
    let service = StockService::new(state.db);
    Ok(Json(service.expired_before(before).await?))
}

/// Per-product stock totals
pub async fn stock_levels(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<StockLevel>>> {
    check_permission(&current_user.0, Resource::Stock, Action::Read)?;
    let service = StockService::new(state.db);
    Ok(Json(service.stock_levels().await?))
}
