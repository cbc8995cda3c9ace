//! Business logic services for the Tradeflow platform

pub mod auth;
pub mod category;
pub mod company;
pub mod email;
pub mod inventory;
pub mod notifier;
pub mod order;
pub mod product;

pub use auth::AuthService;
pub use category::CategoryService;
pub use company::CompanyService;
pub use email::Mailer;
pub use inventory::InventoryService;
pub use notifier::{StockNotifier, StockUpdate};
pub use order::OrderService;
pub use product::ProductService;
