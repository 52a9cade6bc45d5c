use crate::{
    entities::{cart, cart_line, recipe_line, Cart, CartLine, MenuItem, RecipeLine},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{availability, inventory},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// The cashier's cart: an ordered set of (menu item, quantity) lines,
/// quantity-bounded by current stock. The cart never reserves stock; every
/// mutation re-derives the cap from the stock ledger as it is right now,
/// and settlement re-checks once more under its transaction.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Opens a new sale session.
    #[instrument(skip(self))]
    pub async fn create_cart(&self) -> Result<cart::Model, ServiceError> {
        let now = Utc::now();
        let model = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            status: Set(cart::CartStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = model.insert(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::CartCreated(model.id))
            .await;

        info!(cart_id = %model.id, "Opened cart");
        Ok(model)
    }

    /// Adds one unit of a menu item.
    ///
    /// Rejects with `OutOfStock` when current stock cannot cover a single
    /// unit, and with `StockLimit` when the line already sits at the cap.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: Uuid,
        menu_item_id: Uuid,
    ) -> Result<CartWithLines, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = active_cart(&txn, cart_id).await?;
        let item = MenuItem::find_by_id(menu_item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Menu item {} not found", menu_item_id))
            })?;

        let recipe = RecipeLine::find()
            .filter(recipe_line::Column::MenuItemId.eq(menu_item_id))
            .all(&txn)
            .await?;
        let stock = inventory::stock_levels(&txn).await?;
        let cap = availability::max_sellable(&recipe, &stock);

        if cap == Some(0) {
            return Err(ServiceError::OutOfStock(format!(
                "{} cannot be added",
                item.name
            )));
        }

        let existing = CartLine::find()
            .filter(cart_line::Column::CartId.eq(cart_id))
            .filter(cart_line::Column::MenuItemId.eq(menu_item_id))
            .one(&txn)
            .await?;

        match existing {
            Some(line) => {
                if let Some(cap) = cap {
                    if line.quantity as u32 >= cap {
                        return Err(ServiceError::StockLimit(format!(
                            "Cannot add more {}",
                            item.name
                        )));
                    }
                }
                let quantity = line.quantity;
                let mut line: cart_line::ActiveModel = line.into();
                line.quantity = Set(quantity + 1);
                line.updated_at = Set(Utc::now());
                line.update(&txn).await?;
            }
            None => {
                let now = Utc::now();
                let line = cart_line::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart_id),
                    menu_item_id: Set(menu_item_id),
                    quantity: Set(1),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                line.insert(&txn).await?;
            }
        }

        touch_cart(&txn, cart).await?;
        let view = cart_view(&txn, cart_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartLineAdded {
                cart_id,
                menu_item_id,
            })
            .await;

        Ok(view)
    }

    /// Applies a signed delta to a line's quantity.
    ///
    /// A result of zero or less removes the line; an increase above the cap
    /// recomputed against *current* stock is rejected with `StockLimit`,
    /// leaving the prior quantity in place. Stock may have been consumed by
    /// another till since the item was added, which is why the cap is never
    /// trusted from add-time.
    #[instrument(skip(self))]
    pub async fn change_quantity(
        &self,
        cart_id: Uuid,
        menu_item_id: Uuid,
        delta: i32,
    ) -> Result<CartWithLines, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = active_cart(&txn, cart_id).await?;
        let line = CartLine::find()
            .filter(cart_line::Column::CartId.eq(cart_id))
            .filter(cart_line::Column::MenuItemId.eq(menu_item_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Menu item {} is not in the cart", menu_item_id))
            })?;

        // Saturate on client-supplied deltas; an absurd increase then fails
        // the cap check instead of wrapping into a silent removal.
        let new_quantity = line.quantity.saturating_add(delta);
        if new_quantity <= 0 {
            line.delete(&txn).await?;
        } else {
            let recipe = RecipeLine::find()
                .filter(recipe_line::Column::MenuItemId.eq(menu_item_id))
                .all(&txn)
                .await?;
            let stock = inventory::stock_levels(&txn).await?;

            if let Some(cap) = availability::max_sellable(&recipe, &stock) {
                if new_quantity as u32 > cap {
                    let name = MenuItem::find_by_id(menu_item_id)
                        .one(&txn)
                        .await?
                        .map(|m| m.name)
                        .unwrap_or_else(|| "Unknown".to_string());
                    return Err(ServiceError::StockLimit(format!("Cannot add more {}", name)));
                }
            }

            let mut line: cart_line::ActiveModel = line.into();
            line.quantity = Set(new_quantity);
            line.updated_at = Set(Utc::now());
            line.update(&txn).await?;
        }

        touch_cart(&txn, cart).await?;
        let view = cart_view(&txn, cart_id).await?;
        txn.commit().await?;

        Ok(view)
    }

    /// The cart with its lines priced from the live menu.
    pub async fn get_cart(&self, cart_id: Uuid) -> Result<CartWithLines, ServiceError> {
        Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        cart_view(&*self.db, cart_id).await
    }

    /// Empties the cart; called after navigation away or at staff request.
    /// Settlement clears its cart itself inside the settlement transaction.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, cart_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let cart = active_cart(&txn, cart_id).await?;
        CartLine::delete_many()
            .filter(cart_line::Column::CartId.eq(cart_id))
            .exec(&txn)
            .await?;
        touch_cart(&txn, cart).await?;

        txn.commit().await?;
        self.event_sender.send_or_log(Event::CartCleared(cart_id)).await;

        info!(cart_id = %cart_id, "Cleared cart");
        Ok(())
    }

    /// Closes an unsettled cart. Nothing was deducted, so there is nothing
    /// to restore; the cart just stops accepting mutations.
    #[instrument(skip(self))]
    pub async fn abandon_cart(&self, cart_id: Uuid) -> Result<cart::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = active_cart(&txn, cart_id).await?;
        let mut cart: cart::ActiveModel = cart.into();
        cart.status = Set(cart::CartStatus::Abandoned);
        cart.updated_at = Set(Utc::now());
        let cart = cart.update(&txn).await?;

        txn.commit().await?;
        self.event_sender
            .send_or_log(Event::CartAbandoned(cart_id))
            .await;

        info!(cart_id = %cart_id, "Abandoned cart");
        Ok(cart)
    }
}

/// Loads the cart and enforces that it is still open for mutation.
pub async fn active_cart<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> Result<cart::Model, ServiceError> {
    let cart = Cart::find_by_id(cart_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

    if cart.status != cart::CartStatus::Active {
        return Err(ServiceError::InvalidOperation(
            "Cart is not active".to_string(),
        ));
    }
    Ok(cart)
}

async fn touch_cart<C: ConnectionTrait>(conn: &C, cart: cart::Model) -> Result<(), ServiceError> {
    let mut cart: cart::ActiveModel = cart.into();
    cart.updated_at = Set(Utc::now());
    cart.update(conn).await?;
    Ok(())
}

/// Builds the priced view of a cart: lines in insertion order, each priced
/// from the current menu, plus the running total.
pub async fn cart_view<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> Result<CartWithLines, ServiceError> {
    let cart = Cart::find_by_id(cart_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

    let lines = CartLine::find()
        .filter(cart_line::Column::CartId.eq(cart_id))
        .order_by_asc(cart_line::Column::CreatedAt)
        .all(conn)
        .await?;

    let mut views = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;
    for line in lines {
        let menu = MenuItem::find_by_id(line.menu_item_id).one(conn).await?;
        let (name, unit_price) = match menu {
            Some(m) => (m.name, m.price),
            // A menu item deleted mid-session keeps the line visible rather
            // than failing the whole cart.
            None => ("Unknown".to_string(), Decimal::ZERO),
        };
        let line_total = unit_price * Decimal::from(line.quantity);
        total += line_total;
        views.push(CartLineView {
            menu_item_id: line.menu_item_id,
            name,
            quantity: line.quantity,
            unit_price,
            line_total,
        });
    }

    Ok(CartWithLines {
        cart,
        lines: views,
        total,
    })
}

/// A cart line priced against the live menu.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Cart with priced lines and total.
#[derive(Debug, Serialize)]
pub struct CartWithLines {
    pub cart: cart::Model,
    pub lines: Vec<CartLineView>,
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn line_view_totals_multiply_price_by_quantity() {
        let view = CartLineView {
            menu_item_id: Uuid::new_v4(),
            name: "Burger".to_string(),
            quantity: 3,
            unit_price: dec!(1500),
            line_total: dec!(1500) * Decimal::from(3),
        };
        assert_eq!(view.line_total, dec!(4500));
    }
}
