use crate::{
    config::AppConfig,
    entities::{
        inventory_item, order, order_line, InventoryItem, MenuItem, Order, OrderLine,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// End-of-day reporting over settled sales and the stock ledger.
///
/// Only completed orders count as revenue; pending orders may still be
/// cancelled and cancelled ones already gave their stock back.
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Line-by-line sales between two instants, newest sale first, with
    /// the grand total.
    #[instrument(skip(self))]
    pub async fn sales_report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SalesReport, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::Status.eq(order::OrderStatus::Completed))
            .filter(order::Column::CreatedAt.gte(from))
            .filter(order::Column::CreatedAt.lte(to))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let names = menu_names(&self.db).await?;

        let mut rows = Vec::new();
        let mut grand_total = Decimal::ZERO;
        for order in &orders {
            let lines = OrderLine::find()
                .filter(order_line::Column::OrderId.eq(order.id))
                .order_by_asc(order_line::Column::CreatedAt)
                .all(&*self.db)
                .await?;
            for line in lines {
                let subtotal = line.unit_price * Decimal::from(line.quantity);
                grand_total += subtotal;
                rows.push(SalesReportRow {
                    order_id: order.id,
                    menu_item_name: resolve_name(&names, line.menu_item_id),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    subtotal,
                    sold_at: order.created_at,
                });
            }
        }

        Ok(SalesReport {
            from,
            to,
            rows,
            grand_total,
        })
    }

    /// Menu items ranked by revenue across completed orders.
    #[instrument(skip(self))]
    pub async fn top_sellers(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TopSeller>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::Status.eq(order::OrderStatus::Completed))
            .filter(order::Column::CreatedAt.gte(from))
            .filter(order::Column::CreatedAt.lte(to))
            .all(&*self.db)
            .await?;

        let mut tally: HashMap<Uuid, (i64, Decimal)> = HashMap::new();
        for order in &orders {
            let lines = OrderLine::find()
                .filter(order_line::Column::OrderId.eq(order.id))
                .all(&*self.db)
                .await?;
            for line in lines {
                let entry = tally
                    .entry(line.menu_item_id)
                    .or_insert((0, Decimal::ZERO));
                entry.0 += line.quantity as i64;
                entry.1 += line.unit_price * Decimal::from(line.quantity);
            }
        }

        let names = menu_names(&self.db).await?;
        let mut sellers: Vec<TopSeller> = tally
            .into_iter()
            .map(|(menu_item_id, (units_sold, revenue))| TopSeller {
                menu_item_id,
                name: resolve_name(&names, menu_item_id),
                units_sold,
                revenue,
            })
            .collect();
        sellers.sort_by(|a, b| {
            b.revenue
                .cmp(&a.revenue)
                .then(b.units_sold.cmp(&a.units_sold))
                .then(a.name.cmp(&b.name))
        });
        sellers.truncate(limit);
        Ok(sellers)
    }

    /// Current stock with each item classified against the configured
    /// thresholds.
    #[instrument(skip(self))]
    pub async fn inventory_report(&self) -> Result<Vec<InventoryReportRow>, ServiceError> {
        let items = InventoryItem::find()
            .order_by_asc(inventory_item::Column::Name)
            .all(&*self.db)
            .await?;

        Ok(items
            .into_iter()
            .map(|item| {
                let level = classify(
                    item.quantity,
                    self.config.critical_stock_threshold,
                    self.config.low_stock_threshold,
                );
                InventoryReportRow { item, level }
            })
            .collect())
    }
}

fn classify(quantity: Decimal, critical: Decimal, low: Decimal) -> StockLevel {
    if quantity < critical {
        StockLevel::Critical
    } else if quantity < low {
        StockLevel::Low
    } else {
        StockLevel::Ok
    }
}

async fn menu_names(db: &DatabaseConnection) -> Result<HashMap<Uuid, String>, ServiceError> {
    let items = MenuItem::find().all(db).await?;
    Ok(items.into_iter().map(|m| (m.id, m.name)).collect())
}

fn resolve_name(names: &HashMap<Uuid, String>, id: Uuid) -> String {
    // Deleted menu items keep their sales on the books under a placeholder.
    names.get(&id).cloned().unwrap_or_else(|| "Unknown".to_string())
}

#[derive(Debug, Serialize)]
pub struct SalesReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub rows: Vec<SalesReportRow>,
    pub grand_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct SalesReportRow {
    pub order_id: Uuid,
    pub menu_item_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub sold_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TopSeller {
    pub menu_item_id: Uuid,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StockLevel {
    Critical,
    Low,
    Ok,
}

#[derive(Debug, Serialize)]
pub struct InventoryReportRow {
    #[serde(flatten)]
    pub item: inventory_item::Model,
    pub level: StockLevel,
}
