//! Route definitions for the Pharmacy Management Platform

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - catalog
        .nest("/suppliers", supplier_routes(state.clone()))
        .nest("/products", product_routes(state.clone()))
        // Protected routes - stock batches
        .nest("/stock", stock_routes(state.clone()))
        // Protected routes - sales
        .nest("/sales", sale_routes(state.clone()))
        // Protected routes - reports
        .nest("/reports", report_routes(state))
}

/// Supplier routes (protected)
fn supplier_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
        .route("/:supplier_id", get(handlers::get_supplier))
        .route("/:supplier_id/products", get(handlers::get_supplier_products))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Product routes (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/price-range", get(handlers::products_by_price_range))
        .route("/:product_id", get(handlers::get_product))
        .route("/:product_id/stock", get(handlers::get_product_stock))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock batch routes (protected)
fn stock_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::receive_batch))
        .route("/low", get(handlers::low_stock))
        .route("/expiring", get(handlers::expiring))
        .route("/expired", get(handlers::expired))
        .route("/levels", get(handlers::stock_levels))
        .route("/batch/:batch_number", get(handlers::batches_by_number))
        .route(
            "/:batch_id",
            get(handlers::get_batch)
                .patch(handlers::update_batch)
                .delete(handlers::delete_batch),
        )
        .route("/:batch_id/restock", post(handlers::restock_batch))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Sale routes (protected)
fn sale_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/date-range", get(handlers::sales_by_date_range))
        .route("/customer/:customer_name", get(handlers::sales_by_customer))
        .route(
            "/:sale_id",
            get(handlers::get_sale)
                .put(handlers::update_sale)
                .delete(handlers::delete_sale),
        )
        .route("/:sale_id/allocations", get(handlers::get_sale_allocations))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Report routes (protected)
fn report_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/most-sold", get(handlers::most_sold_products))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
