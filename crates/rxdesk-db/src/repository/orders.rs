//! Order repository.
//!
//! Checkout and cancellation run inside a transaction owned by the caller;
//! those functions take a `PgConnection` (`&mut *tx`) instead of the pool.

use rxdesk_common::models::order::{
    Fulfillment, Order, OrderFilter, OrderItem, OrderStatus, PaymentStatus,
};
use rxdesk_common::pricing::OrderTotals;
use rxdesk_common::ids::generate_id;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct NewOrder<'a> {
    pub id: Uuid,
    pub order_number: &'a str,
    pub user_id: Uuid,
    pub fulfillment: Fulfillment,
    pub totals: &'a OrderTotals,
    pub shipping_address: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub prescription_id: Option<Uuid>,
}

/// A priced line to snapshot into `order_items`.
pub struct NewOrderItem<'a> {
    pub product_id: Uuid,
    pub product_name: &'a str,
    pub unit_price: rust_decimal::Decimal,
    pub quantity: i32,
    pub line_total: rust_decimal::Decimal,
}

pub async fn insert_order(conn: &mut PgConnection, o: NewOrder<'_>) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (
            id, order_number, user_id, status, payment_status, fulfillment,
            subtotal, tax, shipping, total, shipping_address, notes, prescription_id,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, 'pending', 'unpaid', $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(o.id)
    .bind(o.order_number)
    .bind(o.user_id)
    .bind(o.fulfillment)
    .bind(o.totals.subtotal)
    .bind(o.totals.tax)
    .bind(o.totals.shipping)
    .bind(o.totals.total)
    .bind(o.shipping_address)
    .bind(o.notes)
    .bind(o.prescription_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: Uuid,
    item: &NewOrderItem<'_>,
) -> Result<OrderItem, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>(
        r#"
        INSERT INTO order_items (id, order_id, product_id, product_name, unit_price, quantity, line_total)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(generate_id())
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.product_name)
    .bind(item.unit_price)
    .bind(item.quantity)
    .bind(item.line_total)
    .fetch_one(&mut *conn)
    .await
}

/// Decrement stock for a locked product row.
pub async fn decrement_stock(conn: &mut PgConnection, product_id: Uuid, quantity: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Put every line of an order back on the shelf.
pub async fn restock_items(conn: &mut PgConnection, order_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE products p SET
            stock_quantity = p.stock_quantity + oi.quantity,
            updated_at = NOW()
        FROM order_items oi
        WHERE oi.order_id = $1 AND oi.product_id = p.id
        "#,
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Lock an order row for a status change.
pub async fn lock_order(conn: &mut PgConnection, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn set_status(conn: &mut PgConnection, id: Uuid, status: OrderStatus) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_one(&mut *conn)
    .await
}

// ---- Reads ----

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_payment_intent(pool: &PgPool, payment_intent_id: &str) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_intent_id = $1")
        .bind(payment_intent_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_items(pool: &PgPool, order_id: Uuid) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_name")
        .bind(order_id)
        .fetch_all(pool)
        .await
}

/// Page through orders. `user_id` scopes to one customer; `None` is the staff view.
pub async fn list_orders(
    pool: &PgPool,
    user_id: Option<Uuid>,
    filter: &OrderFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT * FROM orders
        WHERE ($1::uuid IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR payment_status = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(user_id)
    .bind(filter.status)
    .bind(filter.payment_status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM orders
        WHERE ($1::uuid IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR payment_status = $3)
        "#,
    )
    .bind(user_id)
    .bind(filter.status)
    .bind(filter.payment_status)
    .fetch_one(pool)
    .await?;

    Ok((orders, total.0))
}

// ---- Payments ----

/// Attach a payment intent and mark the order as awaiting payment.
pub async fn attach_payment_intent(
    pool: &PgPool,
    id: Uuid,
    payment_intent_id: &str,
) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders SET
            payment_intent_id = $2,
            payment_status = 'pending',
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payment_intent_id)
    .fetch_one(pool)
    .await
}

/// Record a payment outcome reported by the payments webhook. A succeeded
/// payment also moves a pending order into processing.
pub async fn set_payment_status(
    pool: &PgPool,
    payment_intent_id: &str,
    payment_status: PaymentStatus,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders SET
            payment_status = $2,
            status = CASE
                WHEN $2 = 'paid' AND status = 'pending' THEN 'processing'
                ELSE status
            END,
            updated_at = NOW()
        WHERE payment_intent_id = $1
        RETURNING *
        "#,
    )
    .bind(payment_intent_id)
    .bind(payment_status)
    .fetch_optional(pool)
    .await
}

/// Runs in the caller's transaction so a restock and the delete commit together.
pub async fn delete_order(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
