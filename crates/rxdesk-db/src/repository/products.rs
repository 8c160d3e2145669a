//! Product repository.

use rust_decimal::Decimal;
use rxdesk_common::models::catalog::{Product, ProductFilter};
use sqlx::PgPool;
use uuid::Uuid;

use crate::postgres::like_pattern;

pub struct NewProduct<'a> {
    pub category_id: Option<Uuid>,
    pub name: &'a str,
    pub slug: &'a str,
    pub sku: Option<&'a str>,
    pub description: Option<&'a str>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub requires_prescription: bool,
    pub image_url: Option<&'a str>,
    pub is_active: bool,
}

/// Partial update; every `None` keeps the stored value.
#[derive(Default)]
pub struct ProductChanges<'a> {
    pub category_id: Option<Uuid>,
    pub name: Option<&'a str>,
    pub slug: Option<&'a str>,
    pub sku: Option<&'a str>,
    pub description: Option<&'a str>,
    pub price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub requires_prescription: Option<bool>,
    pub image_url: Option<&'a str>,
    pub is_active: Option<bool>,
}

pub async fn create_product(pool: &PgPool, id: Uuid, p: NewProduct<'_>) -> Result<Product, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (
            id, category_id, name, slug, sku, description, price, sale_price,
            stock_quantity, requires_prescription, image_url, is_active, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(p.category_id)
    .bind(p.name)
    .bind(p.slug)
    .bind(p.sku)
    .bind(p.description)
    .bind(p.price)
    .bind(p.sale_price)
    .bind(p.stock_quantity)
    .bind(p.requires_prescription)
    .bind(p.image_url)
    .bind(p.is_active)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Page through products. `active_only` is set for the public storefront.
pub async fn list_products(
    pool: &PgPool,
    filter: &ProductFilter,
    active_only: bool,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Product>, i64), sqlx::Error> {
    let search = filter.search.as_deref().map(like_pattern);

    let products = sqlx::query_as::<_, Product>(
        r#"
        SELECT * FROM products
        WHERE ($1::uuid IS NULL OR category_id = $1)
          AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2 OR sku ILIKE $2)
          AND ($3::bool IS NULL OR requires_prescription = $3)
          AND (NOT $4 OR is_active)
        ORDER BY name
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(filter.category_id)
    .bind(search.as_deref())
    .bind(filter.requires_prescription)
    .bind(active_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM products
        WHERE ($1::uuid IS NULL OR category_id = $1)
          AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2 OR sku ILIKE $2)
          AND ($3::bool IS NULL OR requires_prescription = $3)
          AND (NOT $4 OR is_active)
        "#,
    )
    .bind(filter.category_id)
    .bind(search.as_deref())
    .bind(filter.requires_prescription)
    .bind(active_only)
    .fetch_one(pool)
    .await?;

    Ok((products, total.0))
}

/// Every active product, for the WooCommerce push.
pub async fn list_active(pool: &PgPool) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE is_active ORDER BY created_at")
        .fetch_all(pool)
        .await
}

pub async fn update_product(
    pool: &PgPool,
    id: Uuid,
    c: ProductChanges<'_>,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET
            category_id = COALESCE($2, category_id),
            name = COALESCE($3, name),
            slug = COALESCE($4, slug),
            sku = COALESCE($5, sku),
            description = COALESCE($6, description),
            price = COALESCE($7, price),
            sale_price = COALESCE($8, sale_price),
            stock_quantity = COALESCE($9, stock_quantity),
            requires_prescription = COALESCE($10, requires_prescription),
            image_url = COALESCE($11, image_url),
            is_active = COALESCE($12, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(c.category_id)
    .bind(c.name)
    .bind(c.slug)
    .bind(c.sku)
    .bind(c.description)
    .bind(c.price)
    .bind(c.sale_price)
    .bind(c.stock_quantity)
    .bind(c.requires_prescription)
    .bind(c.image_url)
    .bind(c.is_active)
    .fetch_optional(pool)
    .await
}

pub async fn set_image(pool: &PgPool, id: Uuid, image_url: &str) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "UPDATE products SET image_url = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(image_url)
    .fetch_optional(pool)
    .await
}

/// Remember the WooCommerce id after a successful push.
pub async fn set_wc_product_id(pool: &PgPool, id: Uuid, wc_product_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET wc_product_id = $2 WHERE id = $1")
        .bind(id)
        .bind(wc_product_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_product(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
