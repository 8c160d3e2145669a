//! Subscription repository (local mirror of Stripe subscriptions).

use chrono::{DateTime, Utc};
use rxdesk_common::models::subscription::Subscription;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_subscription(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    stripe_subscription_id: &str,
    price_id: &str,
    status: &str,
    current_period_end: Option<DateTime<Utc>>,
) -> Result<Subscription, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (
            id, user_id, stripe_subscription_id, price_id, status, current_period_end,
            cancel_at_period_end, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(stripe_subscription_id)
    .bind(price_id)
    .bind(status)
    .bind(current_period_end)
    .fetch_one(pool)
    .await
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Sync status from Stripe (API response or webhook).
pub async fn sync_status(
    pool: &PgPool,
    stripe_subscription_id: &str,
    status: &str,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions SET
            status = $2,
            current_period_end = COALESCE($3, current_period_end),
            cancel_at_period_end = $4,
            updated_at = NOW()
        WHERE stripe_subscription_id = $1
        RETURNING *
        "#,
    )
    .bind(stripe_subscription_id)
    .bind(status)
    .bind(current_period_end)
    .bind(cancel_at_period_end)
    .fetch_optional(pool)
    .await
}
