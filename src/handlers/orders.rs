use crate::handlers::common::{
    map_service_error, success_response, PaginatedResponse, PaginationMeta, PaginationParams,
};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/complete", post(complete_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/receipt", get(order_receipt))
}

/// List orders newest first
async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .settlement
        .list_orders(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse {
        data: orders,
        meta: PaginationMeta::new(&params, total),
    }))
}

/// Get an order with its lines
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .settlement
        .get_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Mark a pending order as served
async fn complete_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .settlement
        .complete(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Cancel a pending order and restore its stock
async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .settlement
        .cancel(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
struct ReceiptParams {
    #[serde(default)]
    format: ReceiptFormat,
}

#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
enum ReceiptFormat {
    #[default]
    Json,
    Text,
    Html,
}

/// Re-issue the slip for an order, as JSON, plain text or a printable page
async fn order_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ReceiptParams>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .services
        .settlement
        .receipt_for_order(id)
        .await
        .map_err(map_service_error)?;

    let response = match params.format {
        ReceiptFormat::Json => success_response(receipt),
        ReceiptFormat::Text => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            receipt.render_text(),
        )
            .into_response(),
        ReceiptFormat::Html => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            receipt.render_html(),
        )
            .into_response(),
    };
    Ok(response)
}
