use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationMeta, PaginationParams,
};
use crate::{
    errors::ApiError,
    services::{availability, menu::CreateMenuItemInput, menu::MenuItemWithRecipe},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for menu endpoints
pub fn menu_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_items))
        .route("/", post(create_item))
        .route("/:id", get(get_item))
        .route("/:id", put(update_item))
        .route("/:id", delete(delete_item))
}

/// Menu item with recipe and the number of units current stock can cover.
/// `max_sellable` of `null` means no recipe constrains the item.
#[derive(Debug, Serialize)]
struct MenuItemWithAvailability {
    #[serde(flatten)]
    item: MenuItemWithRecipe,
    max_sellable: Option<u32>,
}

/// List menu items with live availability
async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (items, total) = state
        .services
        .menu
        .list_items(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    let stock = state
        .services
        .inventory
        .stock_levels()
        .await
        .map_err(map_service_error)?;

    let data = items
        .into_iter()
        .map(|item| {
            let max_sellable = availability::max_sellable(&item.recipe, &stock);
            MenuItemWithAvailability { item, max_sellable }
        })
        .collect();

    Ok(success_response(PaginatedResponse {
        data,
        meta: PaginationMeta::new(&params, total),
    }))
}

/// Create a menu item with its recipe
async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateMenuItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let item = state
        .services
        .menu
        .create_item(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(item))
}

/// Get a menu item with its recipe and availability
async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .services
        .menu
        .get_item(id)
        .await
        .map_err(map_service_error)?;

    let stock = state
        .services
        .inventory
        .stock_levels()
        .await
        .map_err(map_service_error)?;
    let max_sellable = availability::max_sellable(&item.recipe, &stock);

    Ok(success_response(MenuItemWithAvailability {
        item,
        max_sellable,
    }))
}

/// Replace a menu item and its recipe
async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateMenuItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let item = state
        .services
        .menu
        .update_item(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(item))
}

/// Delete a menu item and its recipe
async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .menu
        .delete_item(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
