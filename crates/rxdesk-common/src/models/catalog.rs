//! Product catalog: categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::validation::not_blank;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "not_blank", message = "Name is required")
    )]
    pub name: String,

    /// Derived from the name when omitted
    #[validate(length(min = 1, max = 120))]
    pub slug: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 120))]
    pub slug: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub requires_prescription: bool,
    pub image_url: Option<String>,
    pub is_active: bool,
    /// WooCommerce product id once pushed
    pub wc_product_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn in_stock(&self, quantity: i32) -> bool {
        self.stock_quantity >= quantity
    }
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(
        length(min = 1, max = 200, message = "Name must be 1-200 characters"),
        custom(function = "not_blank", message = "Name is required")
    )]
    pub name: String,

    #[validate(length(min = 1, max = 220))]
    pub slug: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,

    pub category_id: Option<Uuid>,

    #[validate(length(max = 10_000))]
    pub description: Option<String>,

    #[validate(custom(function = "non_negative", message = "Price cannot be negative"))]
    pub price: Decimal,

    #[serde(default)]
    #[validate(custom(function = "non_negative", message = "Sale price cannot be negative"))]
    pub sale_price: Option<Decimal>,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    #[serde(default)]
    pub stock_quantity: i32,

    #[serde(default)]
    pub requires_prescription: bool,

    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 220))]
    pub slug: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,

    pub category_id: Option<Uuid>,

    #[validate(length(max = 10_000))]
    pub description: Option<String>,

    #[serde(default)]
    #[validate(custom(function = "non_negative", message = "Price cannot be negative"))]
    pub price: Option<Decimal>,

    #[serde(default)]
    #[validate(custom(function = "non_negative", message = "Sale price cannot be negative"))]
    pub sale_price: Option<Decimal>,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: Option<i32>,

    pub requires_prescription: Option<bool>,

    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,

    pub is_active: Option<bool>,
}

/// `GET /products` filters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    pub requires_prescription: Option<bool>,
}
