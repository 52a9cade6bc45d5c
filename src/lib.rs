/*!
Point-of-sale backend for a small food and beverage counter.

Menu items are priced bundles of ingredients; the stock ledger tracks
ingredient quantities; carts turn into orders at settlement, which deducts
stock atomically and journals every deduction so a cancellation can put
back exactly what was taken.
*/

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod receipt;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Full v1 API: inventory, menu, carts, orders, reports, plus status and
/// health endpoints.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/inventory", handlers::inventory::inventory_routes())
        .nest("/menu", handlers::menu::menu_routes())
        .nest("/carts", handlers::carts::carts_routes())
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/reports", handlers::reports::reports_routes())
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "fnb-pos-api",
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

// Request logging middleware
pub async fn request_logging_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    tracing::info!(method = %method, uri = %uri, "Incoming request");

    let response = next.run(request).await;

    let duration = start.elapsed();
    tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_response_carries_data() {
        let resp = ApiResponse::success("ok");
        assert!(resp.success);
        assert_eq!(resp.data, Some("ok"));
        assert!(resp.message.is_none());
    }

    #[test]
    fn error_response_carries_message() {
        let resp = ApiResponse::<()>::error("oops".into());
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.message.as_deref(), Some("oops"));
    }
}
