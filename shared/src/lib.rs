//! Shared types and models for the Tradeflow platform
//!
//! This crate contains the domain model, the order lifecycle rules and the
//! validation helpers shared between the backend, the frontend (via WASM),
//! and the test suites.

pub mod error;
pub mod lifecycle;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use lifecycle::*;
pub use models::*;
pub use types::*;
pub use validation::*;
