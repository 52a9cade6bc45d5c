use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_cart))
        .route("/:id", get(get_cart))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:menu_item_id", put(change_quantity))
        .route("/:id/clear", post(clear_cart))
        .route("/:id/abandon", post(abandon_cart))
        .route("/:id/settle", post(settle_cart))
}

/// Open a new cart
async fn create_cart(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .create_cart()
        .await
        .map_err(map_service_error)?;

    Ok(created_response(cart))
}

/// Get a cart with priced lines
async fn get_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .get_cart(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[derive(Debug, Deserialize, Validate)]
struct AddItemRequest {
    menu_item_id: Uuid,
}

/// Add one unit of a menu item to the cart
async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .add_item(id, payload.menu_item_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[derive(Debug, Deserialize, Validate)]
struct ChangeQuantityRequest {
    /// Signed adjustment; a resulting quantity of zero removes the line.
    delta: i32,
}

/// Adjust a line's quantity by a signed delta
async fn change_quantity(
    State(state): State<Arc<AppState>>,
    Path((id, menu_item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ChangeQuantityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .change_quantity(id, menu_item_id, payload.delta)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Remove every line from the cart
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .clear_cart(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Close an unsettled cart without creating an order
async fn abandon_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .abandon_cart(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Settle the cart into a pending order and return the slip
async fn settle_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .settlement
        .settle(id)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(outcome))
}
