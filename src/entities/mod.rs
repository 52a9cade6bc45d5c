pub mod cart;
pub mod cart_line;
pub mod inventory_item;
pub mod menu_item;
pub mod order;
pub mod order_line;
pub mod recipe_line;
pub mod stock_movement;

pub use cart::Entity as Cart;
pub use cart_line::Entity as CartLine;
pub use inventory_item::Entity as InventoryItem;
pub use menu_item::Entity as MenuItem;
pub use order::Entity as Order;
pub use order_line::Entity as OrderLine;
pub use recipe_line::Entity as RecipeLine;
pub use stock_movement::Entity as StockMovement;
