use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationMeta, PaginationParams,
};
use crate::{errors::ApiError, services::inventory::CreateInventoryItemInput, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for inventory endpoints
pub fn inventory_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_items))
        .route("/", post(create_item))
        .route("/:id", get(get_item))
        .route("/:id", put(update_item))
        .route("/:id", delete(delete_item))
}

/// List inventory items
async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (items, total) = state
        .services
        .inventory
        .list_items(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse {
        data: items,
        meta: PaginationMeta::new(&params, total),
    }))
}

/// Create an inventory item
async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateInventoryItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let item = state
        .services
        .inventory
        .create_item(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(item))
}

/// Get a single inventory item
async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .services
        .inventory
        .get_item(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(item))
}

/// Replace an inventory item's name, category and quantity
async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateInventoryItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let item = state
        .services
        .inventory
        .update_item(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(item))
}

/// Delete an inventory item
async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .inventory
        .delete_item(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
