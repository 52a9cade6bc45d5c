use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events emitted by the order/inventory workflow. Consumed by a single
/// in-process logger task; there is no external queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartCreated(Uuid),
    CartLineAdded { cart_id: Uuid, menu_item_id: Uuid },
    CartCleared(Uuid),
    CartAbandoned(Uuid),

    // Order events
    OrderSettled { order_id: Uuid, total: Decimal },
    OrderCompleted(Uuid),
    OrderCancelled(Uuid),

    // Stock events
    StockDeducted {
        order_id: Uuid,
        inventory_item_id: Uuid,
        quantity: Decimal,
    },
    StockRestored {
        order_id: Uuid,
        inventory_item_id: Uuid,
        quantity: Decimal,
    },
    LowStock {
        inventory_item_id: Uuid,
        name: String,
        quantity: Decimal,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Workflow outcomes must not depend on the event pipeline.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. Spawned once at startup.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderSettled { order_id, total } => {
                info!(order_id = %order_id, total = %total, "order settled");
            }
            Event::OrderCompleted(order_id) => {
                info!(order_id = %order_id, "order completed");
            }
            Event::OrderCancelled(order_id) => {
                info!(order_id = %order_id, "order cancelled, stock restored");
            }
            Event::LowStock {
                inventory_item_id,
                name,
                quantity,
            } => {
                warn!(
                    inventory_item_id = %inventory_item_id,
                    name = %name,
                    quantity = %quantity,
                    "ingredient running low"
                );
            }
            other => debug!(event = ?other, "event"),
        }
    }

    info!("Event channel closed, processor exiting");
}
