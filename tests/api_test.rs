mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body was not JSON")
}

#[tokio::test]
async fn status_endpoint_reports_ok() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/v1/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn health_endpoint_reports_database_state() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["checks"]["database"], "healthy");
}

#[tokio::test]
async fn inventory_crud_over_http() {
    let app = TestApp::new().await;
    let router = app.router();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/inventory")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"name": "Coffee beans", "quantity": "250", "category": "Beverage"})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_str().expect("id missing").to_string();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/inventory/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["name"], "Coffee beans");

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/inventory")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed["meta"]["total"], 1);
}

#[tokio::test]
async fn menu_creation_rejects_unknown_ingredients() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/menu")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "name": "Latte",
                        "price": "4.50",
                        "recipe": [{
                            "inventory_item_id": uuid::Uuid::new_v4(),
                            "quantity_per_unit": "18"
                        }]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn menu_listing_includes_availability() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(40)).await;
    app.seed_menu_item("Latte", dec!(4.50), beans, dec!(18))
        .await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/v1/menu")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["name"], "Latte");
    assert_eq!(body["data"][0]["max_sellable"], 2);
}

#[tokio::test]
async fn settling_an_out_of_stock_cart_returns_unprocessable() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(20)).await;
    let latte = app
        .seed_menu_item("Latte", dec!(4.50), beans, dec!(18))
        .await;
    let router = app.router();

    let cart = app.state.services.cart.create_cart().await.unwrap();
    app.state
        .services
        .cart
        .add_item(cart.id, latte)
        .await
        .unwrap();

    // Stock drains between carting and settlement.
    fnb_pos_api::services::inventory::deduct(&*app.state.db, beans, dec!(10))
        .await
        .unwrap();

    let response = router
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(format!("/api/v1/carts/{}/settle", cart.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Coffee beans"));
    assert!(message.contains("Latte"));
}

#[tokio::test]
async fn receipt_is_available_as_text_and_html() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(100)).await;
    let latte = app
        .seed_menu_item("Latte", dec!(4.50), beans, dec!(18))
        .await;
    let router = app.router();

    let cart = app.state.services.cart.create_cart().await.unwrap();
    app.state
        .services
        .cart
        .add_item(cart.id, latte)
        .await
        .unwrap();
    let outcome = app.state.services.settlement.settle(cart.id).await.unwrap();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/orders/{}/receipt?format=text", outcome.order.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("ORDER SLIP"));
    assert!(text.contains("Latte"));

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/orders/{}/receipt?format=html", outcome.order.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
}

#[tokio::test]
async fn unknown_order_returns_not_found() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/orders/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
