//! Notification repository.
//!
//! A caller sees their own `user` notifications, plus the shared `staff`
//! feed when they are pharmacist or admin. The read flag on staff
//! notifications is shared by every staff member.

use rxdesk_common::models::notification::{NewNotification, Notification};
use sqlx::PgPool;
use uuid::Uuid;

const VISIBLE_TO: &str = "((audience = 'user' AND user_id = $1) OR ($2 AND audience = 'staff'))";

pub async fn create_notification(
    pool: &PgPool,
    id: Uuid,
    n: &NewNotification,
) -> Result<Notification, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (
            id, audience, user_id, kind, title, message, resource_type, resource_id,
            is_read, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(n.audience)
    .bind(n.user_id)
    .bind(n.kind)
    .bind(&n.title)
    .bind(&n.message)
    .bind(n.resource_type)
    .bind(n.resource_id)
    .fetch_one(pool)
    .await
}

pub async fn list_visible(
    pool: &PgPool,
    user_id: Uuid,
    is_staff: bool,
    unread_only: bool,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Notification>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, Notification>(&format!(
        r#"
        SELECT * FROM notifications
        WHERE {VISIBLE_TO} AND (NOT $3 OR NOT is_read)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#
    ))
    .bind(user_id)
    .bind(is_staff)
    .bind(unread_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM notifications WHERE {VISIBLE_TO} AND (NOT $3 OR NOT is_read)"
    ))
    .bind(user_id)
    .bind(is_staff)
    .bind(unread_only)
    .fetch_one(pool)
    .await?;

    Ok((rows, total.0))
}

pub async fn unread_count(pool: &PgPool, user_id: Uuid, is_staff: bool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM notifications WHERE {VISIBLE_TO} AND NOT is_read"
    ))
    .bind(user_id)
    .bind(is_staff)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Mark one notification read. Returns `None` when it is not visible to the caller.
pub async fn mark_read(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    is_staff: bool,
) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        "UPDATE notifications SET is_read = TRUE WHERE id = $3 AND {VISIBLE_TO} RETURNING *"
    ))
    .bind(user_id)
    .bind(is_staff)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn mark_all_read(pool: &PgPool, user_id: Uuid, is_staff: bool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(&format!(
        "UPDATE notifications SET is_read = TRUE WHERE {VISIBLE_TO} AND NOT is_read"
    ))
    .bind(user_id)
    .bind(is_staff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_notification(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    is_staff: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!("DELETE FROM notifications WHERE id = $3 AND {VISIBLE_TO}"))
        .bind(user_id)
        .bind(is_staff)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
