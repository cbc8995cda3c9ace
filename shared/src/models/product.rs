//! Company product (catalog) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::Money;

/// A product in a company's private catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProduct {
    pub id: Uuid,
    pub company_id: Uuid,
    pub ean: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    /// Units on hand, never negative
    pub stock_quantity: i32,
    /// Whether buyers may order this product
    pub is_available: bool,
    pub price: Money,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompanyProduct {
    /// Whether the product can appear on a new order line
    pub fn is_orderable(&self) -> bool {
        self.is_available && !self.is_deleted
    }
}

/// Input for adding a product to the acting company's catalog
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub ean: String,
    #[validate(length(min = 1, max = 200, message = "Product name must be 1-200 characters"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
    pub price: Decimal,
    pub currency_code: String,
    #[validate(range(min = 0, message = "Initial stock cannot be negative"))]
    pub stock_quantity: i32,
    pub is_available: Option<bool>,
}

/// Input for updating a catalog product; stock changes go through movements
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
    pub price: Option<Decimal>,
    pub currency_code: Option<String>,
    pub is_available: Option<bool>,
}

/// Filters for listing catalog products
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}
