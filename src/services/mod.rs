pub mod availability;
pub mod cart;
pub mod inventory;
pub mod menu;
pub mod reports;
pub mod settlement;

pub use cart::CartService;
pub use inventory::InventoryService;
pub use menu::MenuService;
pub use reports::ReportService;
pub use settlement::SettlementService;
