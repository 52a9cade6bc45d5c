use crate::handlers::common::{map_service_error, success_response};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Creates the router for report endpoints
pub fn reports_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sales", get(sales_report))
        .route("/top-sellers", get(top_sellers))
        .route("/inventory", get(inventory_report))
}

#[derive(Debug, Deserialize)]
struct DateRangeParams {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

// Defaults to the trailing 24 hours, the shape of an end-of-day report.
fn resolve_range(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let to = to.unwrap_or_else(Utc::now);
    let from = from.unwrap_or(to - Duration::hours(24));
    (from, to)
}

/// Completed sales over a period, line by line with the grand total
async fn sales_report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DateRangeParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (from, to) = resolve_range(params.from, params.to);
    let report = state
        .services
        .reports
        .sales_report(from, to)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(report))
}

#[derive(Debug, Deserialize)]
struct TopSellersParams {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    #[serde(default = "default_top_limit")]
    limit: usize,
}

fn default_top_limit() -> usize {
    5
}

/// Menu items ranked by revenue
async fn top_sellers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopSellersParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (from, to) = resolve_range(params.from, params.to);
    let sellers = state
        .services
        .reports
        .top_sellers(from, to, params.limit)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(sellers))
}

/// Current stock classified as critical, low or ok
async fn inventory_report(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state
        .services
        .reports
        .inventory_report()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(rows))
}
