//! Domain models for the Tradeflow platform

mod category;
mod company;
mod inventory;
mod order;
mod product;
mod user;

pub use category::*;
pub use company::*;
pub use inventory::*;
pub use order::*;
pub use product::*;
pub use user::*;
