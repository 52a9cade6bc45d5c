use std::sync::Arc;

use axum::Router;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use fnb_pos_api::{
    config::AppConfig,
    db,
    entities::{inventory_item, menu_item, recipe_line},
    events::{self, EventSender},
    handlers::AppServices,
    services::{CartService, InventoryService, MenuService, ReportService, SettlementService},
    AppState,
};

/// Harness backed by an in-memory SQLite database, one per test.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps the in-memory database alive and shared.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db = Arc::new(pool);
        let cfg = Arc::new(cfg);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices {
            inventory: InventoryService::new(db.clone(), event_sender.clone(), cfg.clone()),
            menu: MenuService::new(db.clone()),
            cart: CartService::new(db.clone(), event_sender.clone()),
            settlement: SettlementService::new(db.clone(), event_sender.clone(), cfg.clone()),
            reports: ReportService::new(db.clone(), cfg.clone()),
        };

        let state = AppState {
            db,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            state,
            _event_task: event_task,
        }
    }

    /// The full v1 API wired to this test's state.
    #[allow(dead_code)]
    pub fn router(&self) -> Router {
        Router::new()
            .nest("/api/v1", fnb_pos_api::api_v1_routes())
            .with_state(Arc::new(self.state.clone()))
    }

    /// Inserts an ingredient directly and returns its id.
    pub async fn seed_ingredient(&self, name: &str, quantity: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        let item = inventory_item::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            quantity: Set(quantity),
            category: Set("test".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        item.insert(&*self.state.db)
            .await
            .expect("failed to seed ingredient");
        id
    }

    /// Inserts a menu item with a single-ingredient recipe.
    pub async fn seed_menu_item(
        &self,
        name: &str,
        price: Decimal,
        ingredient_id: Uuid,
        per_unit: Decimal,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        let item = menu_item::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            price: Set(price),
            created_at: Set(now),
            updated_at: Set(now),
        };
        item.insert(&*self.state.db)
            .await
            .expect("failed to seed menu item");

        let line = recipe_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            menu_item_id: Set(id),
            inventory_item_id: Set(ingredient_id),
            quantity_per_unit: Set(per_unit),
        };
        line.insert(&*self.state.db)
            .await
            .expect("failed to seed recipe line");

        id
    }

    /// Current quantity of an ingredient.
    pub async fn stock_of(&self, ingredient_id: Uuid) -> Decimal {
        use sea_orm::EntityTrait;
        fnb_pos_api::entities::InventoryItem::find_by_id(ingredient_id)
            .one(&*self.state.db)
            .await
            .expect("query failed")
            .expect("ingredient missing")
            .quantity
    }
}
