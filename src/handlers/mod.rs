pub mod carts;
pub mod common;
pub mod inventory;
pub mod menu;
pub mod orders;
pub mod reports;

use crate::services::{
    CartService, InventoryService, MenuService, ReportService, SettlementService,
};

/// All application services, wired once at startup and shared through
/// [`crate::AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub inventory: InventoryService,
    pub menu: MenuService,
    pub cart: CartService,
    pub settlement: SettlementService,
    pub reports: ReportService,
}
