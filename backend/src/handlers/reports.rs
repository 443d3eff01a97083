//! Reporting handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use shared::{Action, ProductSales, Resource};

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::SaleService;
use crate::AppState;

const DEFAULT_RANKING_LIMIT: i64 = 10;

#[derive(Deserialize)]
pub struct MostSoldQuery {
    pub limit: Option<i64>,
}

/// Products ranked by units sold
pub async fn most_sold_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<MostSoldQuery>,
) -> AppResult<Json<Vec<ProductSales>>> {
    check_permission(&current_user.0, Resource::Report, Action::Read)?;
    let service = SaleService::new(state.db, &state.config.stock);
    let ranking = service
        .most_sold_products(query.limit.unwrap_or(DEFAULT_RANKING_LIMIT))
        .await?;
    Ok(Json(ranking))
}
