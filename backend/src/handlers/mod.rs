//! HTTP request handlers

pub mod auth;
pub mod category;
pub mod company;
pub mod exchange_rate;
pub mod health;
pub mod inventory;
pub mod order;
pub mod product;
pub mod realtime;

pub use auth::*;
pub use category::*;
pub use company::*;
pub use exchange_rate::*;
pub use health::*;
pub use inventory::*;
pub use order::*;
pub use product::*;
pub use realtime::*;
