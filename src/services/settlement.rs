use crate::{
    config::AppConfig,
    entities::{
        cart, cart_line, order, order_line, recipe_line, stock_movement, CartLine, InventoryItem,
        MenuItem, Order, OrderLine, RecipeLine, StockMovement,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    receipt::{Receipt, ReceiptLine},
    services::{cart as cart_service, inventory},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Turns a cart into a settled order and maintains the order lifecycle
/// afterwards (pending -> completed | cancelled).
///
/// Everything that touches stock happens inside a single database
/// transaction: either the order exists and every ingredient was deducted,
/// or nothing changed. Each deduction is journaled in `stock_movements` so
/// cancellation restores exactly what was taken, even if a recipe was
/// edited in between.
#[derive(Clone)]
pub struct SettlementService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    config: Arc<AppConfig>,
}

impl SettlementService {
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

    /// Settles the cart: creates a pending order with prices captured at
    /// the moment of sale, deducts every required ingredient, journals the
    /// deductions, and converts the cart.
    #[instrument(skip(self))]
    pub async fn settle(&self, cart_id: Uuid) -> Result<SettlementOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = cart_service::active_cart(&txn, cart_id).await?;
        let lines = CartLine::find()
            .filter(cart_line::Column::CartId.eq(cart_id))
            .order_by_asc(cart_line::Column::CreatedAt)
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cannot settle an empty cart".to_string(),
            ));
        }

        // Resolve menu items and recipes up front. A menu item deleted
        // between carting and settlement fails the whole settlement.
        let mut menu_items = HashMap::new();
        let mut recipes: HashMap<Uuid, Vec<recipe_line::Model>> = HashMap::new();
        for line in &lines {
            let item = MenuItem::find_by_id(line.menu_item_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Menu item {} no longer exists",
                        line.menu_item_id
                    ))
                })?;
            let recipe = RecipeLine::find()
                .filter(recipe_line::Column::MenuItemId.eq(line.menu_item_id))
                .all(&txn)
                .await?;
            recipes.insert(item.id, recipe);
            menu_items.insert(item.id, item);
        }

        // Pre-flight: walk the demand against a snapshot of stock so the
        // rejection can name the exact ingredient and menu item. The atomic
        // decrements below remain the real guard against concurrent tills.
        let ingredients: HashMap<Uuid, _> = InventoryItem::find()
            .all(&txn)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        let mut remaining: HashMap<Uuid, Decimal> = ingredients
            .values()
            .map(|i| (i.id, i.quantity))
            .collect();
        let mut demand: HashMap<Uuid, Decimal> = HashMap::new();

        for line in &lines {
            let item = &menu_items[&line.menu_item_id];
            for rl in &recipes[&line.menu_item_id] {
                let needed = rl.quantity_per_unit * Decimal::from(line.quantity);
                let left = remaining.entry(rl.inventory_item_id).or_insert(Decimal::ZERO);
                *left -= needed;
                if *left < Decimal::ZERO {
                    let ingredient = ingredients
                        .get(&rl.inventory_item_id)
                        .map(|i| i.name.clone())
                        .unwrap_or_else(|| "Unknown".to_string());
                    return Err(ServiceError::InsufficientStock(format!(
                        "Not enough {} for {}",
                        ingredient, item.name
                    )));
                }
                *demand.entry(rl.inventory_item_id).or_insert(Decimal::ZERO) += needed;
            }
        }

        // Create the order and capture prices as they are right now.
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let total: Decimal = lines
            .iter()
            .map(|l| menu_items[&l.menu_item_id].price * Decimal::from(l.quantity))
            .sum();

        let order_model = order::ActiveModel {
            id: Set(order_id),
            total: Set(total),
            status: Set(order::OrderStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order_model = order_model.insert(&txn).await?;

        let mut receipt_lines = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = &menu_items[&line.menu_item_id];
            let line_total = item.price * Decimal::from(line.quantity);

            let ol = order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                menu_item_id: Set(line.menu_item_id),
                quantity: Set(line.quantity),
                unit_price: Set(item.price),
                created_at: Set(now),
            };
            ol.insert(&txn).await?;

            receipt_lines.push(ReceiptLine {
                name: item.name.clone(),
                quantity: line.quantity,
                unit_price: item.price,
                line_total,
            });
        }

        // Deduct and journal. A failed decrement here means another till
        // consumed the stock since the pre-flight snapshot; the transaction
        // rolls back whole.
        let mut movements = Vec::with_capacity(demand.len());
        for (&inventory_item_id, &amount) in &demand {
            inventory::deduct(&txn, inventory_item_id, amount).await?;
            let movement = stock_movement::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                inventory_item_id: Set(inventory_item_id),
                quantity_deducted: Set(amount),
                created_at: Set(now),
            };
            movement.insert(&txn).await?;
            movements.push((inventory_item_id, amount));
        }

        // Convert the cart and drop its lines; the session is over.
        CartLine::delete_many()
            .filter(cart_line::Column::CartId.eq(cart_id))
            .exec(&txn)
            .await?;
        let mut cart: cart::ActiveModel = cart.into();
        cart.status = Set(cart::CartStatus::Converted);
        cart.updated_at = Set(now);
        cart.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderSettled { order_id, total })
            .await;
        for (inventory_item_id, quantity) in movements {
            self.event_sender
                .send_or_log(Event::StockDeducted {
                    order_id,
                    inventory_item_id,
                    quantity,
                })
                .await;
            inventory::check_low_stock(
                &*self.db,
                &self.event_sender,
                self.config.critical_stock_threshold,
                inventory_item_id,
            )
            .await;
        }

        info!(order_id = %order_id, %total, "Settled order");

        let receipt = Receipt {
            order_id,
            issued_at: now,
            status: order::OrderStatus::Pending.label().to_string(),
            lines: receipt_lines,
            total,
        };
        Ok(SettlementOutcome {
            order: order_model,
            receipt,
        })
    }

    /// Marks a pending order as served. No stock effect; the deductions
    /// made at settlement stand.
    #[instrument(skip(self))]
    pub async fn complete(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let order = claim_pending(&txn, order_id, order::OrderStatus::Completed).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCompleted(order_id))
            .await;
        info!(order_id = %order_id, "Completed order");
        Ok(order)
    }

    /// Cancels a pending order and puts the stock back by replaying the
    /// order's movement journal, not the current recipe.
    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        // Claim the transition before touching stock: the loser of a race
        // sees zero rows affected and never reaches the journal replay.
        let order = claim_pending(&txn, order_id, order::OrderStatus::Cancelled).await?;

        let movements = StockMovement::find()
            .filter(stock_movement::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        for movement in &movements {
            inventory::restore(&txn, movement.inventory_item_id, movement.quantity_deducted)
                .await?;
        }
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        for movement in movements {
            self.event_sender
                .send_or_log(Event::StockRestored {
                    order_id,
                    inventory_item_id: movement.inventory_item_id,
                    quantity: movement.quantity_deducted,
                })
                .await;
        }

        info!(order_id = %order_id, "Cancelled order and restored stock");
        Ok(order)
    }

    /// Orders newest first, with pagination.
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithLines, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let lines = OrderLine::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .order_by_asc(order_line::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(OrderWithLines { order, lines })
    }

    /// Re-issues the slip for an existing order. Names come from the live
    /// menu; prices come from the order lines as captured at sale.
    pub async fn receipt_for_order(&self, order_id: Uuid) -> Result<Receipt, ServiceError> {
        let OrderWithLines { order, lines } = self.get_order(order_id).await?;

        let mut receipt_lines = Vec::with_capacity(lines.len());
        for line in lines {
            let name = MenuItem::find_by_id(line.menu_item_id)
                .one(&*self.db)
                .await?
                .map(|m| m.name)
                .unwrap_or_else(|| "Unknown".to_string());
            receipt_lines.push(ReceiptLine {
                name,
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.unit_price * Decimal::from(line.quantity),
            });
        }

        Ok(Receipt {
            order_id: order.id,
            issued_at: order.created_at,
            status: order.status.label().to_string(),
            lines: receipt_lines,
            total: order.total,
        })
    }

}

/// Conditional status transition: `UPDATE orders SET status = ? WHERE id = ?
/// AND status = 'pending'`. Zero rows affected means another session already
/// moved the order on, so only one of two racing cancel calls ever replays
/// the movement journal.
async fn claim_pending<C: sea_orm::ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    to: order::OrderStatus,
) -> Result<order::Model, ServiceError> {
    let result = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(to))
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(order::OrderStatus::Pending))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let order = Order::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        return Err(ServiceError::InvalidStatus(format!(
            "Order is {}, only pending orders can change state",
            order.status.label()
        )));
    }

    Order::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

#[derive(Debug, Serialize)]
pub struct SettlementOutcome {
    pub order: order::Model,
    pub receipt: Receipt,
}

#[derive(Debug, Serialize)]
pub struct OrderWithLines {
    pub order: order::Model,
    pub lines: Vec<order_line::Model>,
}
