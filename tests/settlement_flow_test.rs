mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use fnb_pos_api::{
    entities::{menu_item, order, recipe_line, MenuItem, RecipeLine},
    errors::ServiceError,
    services::inventory,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

#[tokio::test]
async fn settling_a_cart_deducts_stock_and_creates_a_pending_order() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(100)).await;
    let latte = app
        .seed_menu_item("Latte", dec!(4.50), beans, dec!(18))
        .await;

    let cart = app.state.services.cart.create_cart().await.unwrap();
    app.state.services.cart.add_item(cart.id, latte).await.unwrap();
    app.state.services.cart.add_item(cart.id, latte).await.unwrap();

    let outcome = app.state.services.settlement.settle(cart.id).await.unwrap();
    assert_eq!(outcome.order.status, order::OrderStatus::Pending);
    assert_eq!(outcome.order.total, dec!(9.00));
    assert_eq!(outcome.receipt.lines.len(), 1);
    assert_eq!(outcome.receipt.lines[0].quantity, 2);

    // 2 cups at 18g each.
    assert_eq!(app.stock_of(beans).await, dec!(64));

    // The cart is spent.
    let err = app
        .state
        .services
        .cart
        .add_item(cart.id, latte)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn settling_an_empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let cart = app.state.services.cart.create_cart().await.unwrap();

    let err = app
        .state
        .services
        .settlement
        .settle(cart.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn insufficient_stock_fails_settlement_and_leaves_stock_untouched() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(40)).await;
    let latte = app
        .seed_menu_item("Latte", dec!(4.50), beans, dec!(18))
        .await;

    let cart = app.state.services.cart.create_cart().await.unwrap();
    app.state.services.cart.add_item(cart.id, latte).await.unwrap();
    app.state.services.cart.add_item(cart.id, latte).await.unwrap();

    // Another sale drains the beans between carting and settlement.
    fnb_pos_api::services::inventory::deduct(&*app.state.db, beans, dec!(30))
        .await
        .unwrap();

    let err = app
        .state
        .services
        .settlement
        .settle(cart.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(msg) => {
        assert!(msg.contains("Coffee beans"));
        assert!(msg.contains("Latte"));
    });

    // Nothing was deducted by the failed settlement.
    assert_eq!(app.stock_of(beans).await, dec!(10));
}

#[tokio::test]
async fn cancelling_restores_exactly_what_was_deducted() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(100)).await;
    let latte = app
        .seed_menu_item("Latte", dec!(4.50), beans, dec!(18))
        .await;

    let cart = app.state.services.cart.create_cart().await.unwrap();
    app.state.services.cart.add_item(cart.id, latte).await.unwrap();
    let outcome = app.state.services.settlement.settle(cart.id).await.unwrap();
    assert_eq!(app.stock_of(beans).await, dec!(82));

    // The recipe is changed after the sale; the refund must still use the
    // journaled amount, not the new recipe.
    let line = RecipeLine::find()
        .filter(recipe_line::Column::MenuItemId.eq(latte))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut line: recipe_line::ActiveModel = line.into();
    line.quantity_per_unit = Set(dec!(25));
    line.update(&*app.state.db).await.unwrap();

    let cancelled = app
        .state
        .services
        .settlement
        .cancel(outcome.order.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, order::OrderStatus::Cancelled);
    assert_eq!(app.stock_of(beans).await, dec!(100));
}

#[tokio::test]
async fn only_pending_orders_change_state() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(100)).await;
    let latte = app
        .seed_menu_item("Latte", dec!(4.50), beans, dec!(18))
        .await;

    let cart = app.state.services.cart.create_cart().await.unwrap();
    app.state.services.cart.add_item(cart.id, latte).await.unwrap();
    let outcome = app.state.services.settlement.settle(cart.id).await.unwrap();

    let completed = app
        .state
        .services
        .settlement
        .complete(outcome.order.id)
        .await
        .unwrap();
    assert_eq!(completed.status, order::OrderStatus::Completed);

    // A served order can no longer be cancelled; its stock stays deducted.
    let err = app
        .state
        .services
        .settlement
        .cancel(outcome.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
    assert_eq!(app.stock_of(beans).await, dec!(82));
}

#[tokio::test]
async fn receipts_keep_the_price_captured_at_sale() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(100)).await;
    let latte = app
        .seed_menu_item("Latte", dec!(4.50), beans, dec!(18))
        .await;

    let cart = app.state.services.cart.create_cart().await.unwrap();
    app.state.services.cart.add_item(cart.id, latte).await.unwrap();
    let outcome = app.state.services.settlement.settle(cart.id).await.unwrap();

    // Reprice the menu after the sale.
    let item = MenuItem::find_by_id(latte)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut item: menu_item::ActiveModel = item.into();
    item.price = Set(dec!(6.00));
    item.update(&*app.state.db).await.unwrap();

    let receipt = app
        .state
        .services
        .settlement
        .receipt_for_order(outcome.order.id)
        .await
        .unwrap();
    assert_eq!(receipt.lines[0].unit_price, dec!(4.50));
    assert_eq!(receipt.total, dec!(4.50));

    let text = receipt.render_text();
    assert!(text.contains("Latte"));
    assert!(text.contains("Thank you!"));
}

#[tokio::test]
async fn sales_report_counts_only_completed_orders() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(500)).await;
    let latte = app
        .seed_menu_item("Latte", dec!(4.50), beans, dec!(18))
        .await;

    // One completed, one still pending, one cancelled.
    for outcome_kind in ["complete", "pending", "cancel"] {
        let cart = app.state.services.cart.create_cart().await.unwrap();
        app.state.services.cart.add_item(cart.id, latte).await.unwrap();
        let outcome = app.state.services.settlement.settle(cart.id).await.unwrap();
        match outcome_kind {
            "complete" => {
                app.state
                    .services
                    .settlement
                    .complete(outcome.order.id)
                    .await
                    .unwrap();
            }
            "cancel" => {
                app.state
                    .services
                    .settlement
                    .cancel(outcome.order.id)
                    .await
                    .unwrap();
            }
            _ => {}
        }
    }

    let from = Utc::now() - Duration::hours(1);
    let to = Utc::now() + Duration::hours(1);
    let report = app
        .state
        .services
        .reports
        .sales_report(from, to)
        .await
        .unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.grand_total, dec!(4.50));

    let sellers = app
        .state
        .services
        .reports
        .top_sellers(from, to, 5)
        .await
        .unwrap();
    assert_eq!(sellers.len(), 1);
    assert_eq!(sellers[0].units_sold, 1);
    assert_eq!(sellers[0].name, "Latte");
}

#[tokio::test]
async fn inventory_report_classifies_stock_levels() {
    let app = TestApp::new().await;
    app.seed_ingredient("Napkins", dec!(2)).await;
    app.seed_ingredient("Milk", dec!(7)).await;
    app.seed_ingredient("Beans", dec!(50)).await;

    let rows = app
        .state
        .services
        .reports
        .inventory_report()
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);

    let level_of = |name: &str| {
        rows.iter()
            .find(|r| r.item.name == name)
            .map(|r| format!("{:?}", r.level))
            .unwrap()
    };
    assert_eq!(level_of("Napkins"), "Critical");
    assert_eq!(level_of("Milk"), "Low");
    assert_eq!(level_of("Beans"), "Ok");
}

#[tokio::test]
async fn conditional_deduct_rejects_shortfall_without_mutating() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(10)).await;

    let err = inventory::deduct(&*app.state.db, beans, dec!(15))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.stock_of(beans).await, dec!(10));

    // An amount the row still covers goes through.
    inventory::deduct(&*app.state.db, beans, dec!(4)).await.unwrap();
    assert_eq!(app.stock_of(beans).await, dec!(6));

    // Draining the rest exactly is fine; one more gram is not.
    inventory::deduct(&*app.state.db, beans, dec!(6)).await.unwrap();
    let err = inventory::deduct(&*app.state.db, beans, dec!(0.1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.stock_of(beans).await, dec!(0));
}

#[tokio::test]
async fn second_cancel_is_rejected_and_stock_is_restored_once() {
    let app = TestApp::new().await;
    let beans = app.seed_ingredient("Coffee beans", dec!(100)).await;
    let latte = app
        .seed_menu_item("Latte", dec!(4.50), beans, dec!(18))
        .await;

    let cart = app.state.services.cart.create_cart().await.unwrap();
    app.state.services.cart.add_item(cart.id, latte).await.unwrap();
    let outcome = app.state.services.settlement.settle(cart.id).await.unwrap();
    assert_eq!(app.stock_of(beans).await, dec!(82));

    app.state
        .services
        .settlement
        .cancel(outcome.order.id)
        .await
        .unwrap();
    assert_eq!(app.stock_of(beans).await, dec!(100));

    // The status row is already claimed; the journal must not replay again.
    let err = app
        .state
        .services
        .settlement
        .cancel(outcome.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
    assert_eq!(app.stock_of(beans).await, dec!(100));
}
