//! Cart repository. Each user has at most one cart, created on first use.

use rxdesk_common::models::cart::{Cart, CartLine};
use rxdesk_common::ids::generate_id;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Fetch the user's cart, creating it if needed.
pub async fn get_or_create(pool: &PgPool, user_id: Uuid) -> Result<Cart, sqlx::Error> {
    sqlx::query_as::<_, Cart>(
        r#"
        INSERT INTO carts (id, user_id, created_at, updated_at)
        VALUES ($1, $2, NOW(), NOW())
        ON CONFLICT (user_id) DO UPDATE SET updated_at = carts.updated_at
        RETURNING *
        "#,
    )
    .bind(generate_id())
    .bind(user_id)
    .fetch_one(pool)
    .await
}

const LINE_COLUMNS: &str = r#"
    ci.id, ci.product_id, ci.quantity,
    p.name, p.slug, p.image_url, p.price, p.sale_price,
    p.stock_quantity, p.requires_prescription, p.is_active
"#;

/// Cart lines joined with the current product data.
pub async fn list_lines(pool: &PgPool, cart_id: Uuid) -> Result<Vec<CartLine>, sqlx::Error> {
    sqlx::query_as::<_, CartLine>(&format!(
        r#"
        SELECT {LINE_COLUMNS}
        FROM cart_items ci
        INNER JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at
        "#
    ))
    .bind(cart_id)
    .fetch_all(pool)
    .await
}

/// Quantity of a product already in the cart (0 when absent).
pub async fn line_quantity(pool: &PgPool, cart_id: Uuid, product_id: Uuid) -> Result<i32, sqlx::Error> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|r| r.0).unwrap_or(0))
}

/// Insert or overwrite the quantity of one line.
pub async fn set_quantity(
    pool: &PgPool,
    cart_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity, created_at, updated_at)
        VALUES ($1, $2, $3, $4, NOW(), NOW())
        ON CONFLICT (cart_id, product_id)
        DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
        "#,
    )
    .bind(generate_id())
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_line(pool: &PgPool, cart_id: Uuid, product_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
        .bind(cart_id)
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn clear(pool: &PgPool, cart_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---- Checkout (inside the caller's transaction) ----

/// The user's cart lines with their product rows locked `FOR UPDATE`, so
/// concurrent checkouts serialise on stock.
pub async fn lock_lines_for_checkout(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<CartLine>, sqlx::Error> {
    sqlx::query_as::<_, CartLine>(&format!(
        r#"
        SELECT {LINE_COLUMNS}
        FROM cart_items ci
        INNER JOIN carts c ON c.id = ci.cart_id
        INNER JOIN products p ON p.id = ci.product_id
        WHERE c.user_id = $1
        ORDER BY p.id
        FOR UPDATE OF p
        "#
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn clear_for_user(conn: &mut PgConnection, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
