use crate::{
    config::AppConfig,
    entities::{inventory_item, InventoryItem},
    errors::ServiceError,
    events::{Event, EventSender},
    services::availability::StockLevels,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Stock ledger: staff-facing CRUD over ingredients plus the stock snapshot
/// the availability calculator consumes. The workflow mutations (`deduct`,
/// `restore`) are free functions so settlement can run them inside its own
/// transaction.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    config: Arc<AppConfig>,
}

impl InventoryService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_item(
        &self,
        input: CreateInventoryItemInput,
    ) -> Result<inventory_item::Model, ServiceError> {
        input.validate()?;
        if input.quantity < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Quantity must be non-negative".to_string(),
            ));
        }

        let now = Utc::now();
        let item = inventory_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            quantity: Set(input.quantity),
            category: Set(input.category),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let item = item.insert(&*self.db).await?;
        info!(inventory_item_id = %item.id, "Created inventory item");
        Ok(item)
    }

    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        id: Uuid,
        input: CreateInventoryItemInput,
    ) -> Result<inventory_item::Model, ServiceError> {
        input.validate()?;
        if input.quantity < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Quantity must be non-negative".to_string(),
            ));
        }

        let item = InventoryItem::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", id)))?;

        let mut item: inventory_item::ActiveModel = item.into();
        item.name = Set(input.name);
        item.quantity = Set(input.quantity);
        item.category = Set(input.category);
        item.updated_at = Set(Utc::now());
        let item = item.update(&*self.db).await?;

        // A manual correction can drop an ingredient below the alert line.
        check_low_stock(
            &*self.db,
            &self.event_sender,
            self.config.critical_stock_threshold,
            id,
        )
        .await;

        Ok(item)
    }

    pub async fn get_item(&self, id: Uuid) -> Result<inventory_item::Model, ServiceError> {
        InventoryItem::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", id)))
    }

    /// Lists inventory items ordered by name, with pagination.
    pub async fn list_items(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<inventory_item::Model>, u64), ServiceError> {
        let paginator = InventoryItem::find()
            .order_by_asc(inventory_item::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = InventoryItem::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Inventory item {} not found",
                id
            )));
        }
        info!(inventory_item_id = %id, "Deleted inventory item");
        Ok(())
    }

    /// Snapshot of all on-hand quantities, keyed by inventory item id.
    pub async fn stock_levels(&self) -> Result<StockLevels, ServiceError> {
        stock_levels(&*self.db).await
    }

}

/// Emits a LowStock event when the item sits below `threshold`. Failures are
/// logged and swallowed; workflow outcomes never depend on this check.
pub async fn check_low_stock<C: ConnectionTrait>(
    conn: &C,
    event_sender: &EventSender,
    threshold: Decimal,
    inventory_item_id: Uuid,
) {
    let item = match InventoryItem::find_by_id(inventory_item_id).one(conn).await {
        Ok(Some(item)) => item,
        Ok(None) => return,
        Err(e) => {
            warn!(inventory_item_id = %inventory_item_id, error = %e, "Low-stock check failed");
            return;
        }
    };

    if item.quantity < threshold {
        event_sender
            .send_or_log(Event::LowStock {
                inventory_item_id: item.id,
                name: item.name,
                quantity: item.quantity,
            })
            .await;
    }
}

/// Snapshot of on-hand quantities over any connection (pool or transaction).
pub async fn stock_levels<C: ConnectionTrait>(conn: &C) -> Result<StockLevels, ServiceError> {
    let items = InventoryItem::find().all(conn).await?;
    Ok(items.into_iter().map(|i| (i.id, i.quantity)).collect())
}

/// Atomic conditional decrement: `UPDATE inventory_items SET quantity =
/// quantity - ? WHERE id = ? AND quantity >= ?`. Zero rows affected means
/// the ingredient no longer covers the amount; the caller's transaction
/// rolls back without any read-then-write window for a concurrent session
/// to exploit.
pub async fn deduct<C: ConnectionTrait>(
    conn: &C,
    inventory_item_id: Uuid,
    amount: Decimal,
) -> Result<(), ServiceError> {
    let result = InventoryItem::update_many()
        .col_expr(
            inventory_item::Column::Quantity,
            Expr::col(inventory_item::Column::Quantity).sub(amount),
        )
        .col_expr(
            inventory_item::Column::UpdatedAt,
            Expr::value(Utc::now()),
        )
        .filter(inventory_item::Column::Id.eq(inventory_item_id))
        .filter(inventory_item::Column::Quantity.gte(amount))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "Ingredient {} no longer covers the required {}",
            inventory_item_id, amount
        )));
    }
    Ok(())
}

/// Unconditional increment; the additive inverse of `deduct`, used by order
/// reversal.
pub async fn restore<C: ConnectionTrait>(
    conn: &C,
    inventory_item_id: Uuid,
    amount: Decimal,
) -> Result<(), ServiceError> {
    InventoryItem::update_many()
        .col_expr(
            inventory_item::Column::Quantity,
            Expr::col(inventory_item::Column::Quantity).add(amount),
        )
        .col_expr(
            inventory_item::Column::UpdatedAt,
            Expr::value(Utc::now()),
        )
        .filter(inventory_item::Column::Id.eq(inventory_item_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Input for creating or updating an inventory item.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInventoryItemInput {
    #[validate(length(min = 1, message = "Item name is required"))]
    pub name: String,
    pub quantity: Decimal,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
}
