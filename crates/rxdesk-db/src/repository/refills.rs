//! Refill request repository.

use rxdesk_common::models::order::Fulfillment;
use rxdesk_common::models::refill::{CreateRefillRequest, RefillRequest, RefillStatus};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_refill(
    pool: &PgPool,
    id: Uuid,
    user_id: Option<Uuid>,
    req: &CreateRefillRequest,
) -> Result<RefillRequest, sqlx::Error> {
    sqlx::query_as::<_, RefillRequest>(
        r#"
        INSERT INTO refill_requests (
            id, user_id, patient_name, date_of_birth, phone, email, rx_number,
            medication_name, fulfillment, preferred_date, notes, status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(req.patient_name.trim())
    .bind(req.date_of_birth)
    .bind(&req.phone)
    .bind(req.email.as_deref())
    .bind(req.rx_number.trim())
    .bind(req.medication_name.as_deref())
    .bind(req.fulfillment.unwrap_or(Fulfillment::Pickup))
    .bind(req.preferred_date)
    .bind(req.notes.as_deref())
    .fetch_one(pool)
    .await
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<RefillRequest>, sqlx::Error> {
    sqlx::query_as::<_, RefillRequest>(
        "SELECT * FROM refill_requests WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_refills(
    pool: &PgPool,
    status: Option<RefillStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<RefillRequest>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, RefillRequest>(
        r#"
        SELECT * FROM refill_requests
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM refill_requests WHERE ($1::text IS NULL OR status = $1)")
            .bind(status)
            .fetch_one(pool)
            .await?;

    Ok((rows, total.0))
}

pub async fn update_refill(
    pool: &PgPool,
    id: Uuid,
    status: Option<RefillStatus>,
    staff_notes: Option<&str>,
) -> Result<Option<RefillRequest>, sqlx::Error> {
    sqlx::query_as::<_, RefillRequest>(
        r#"
        UPDATE refill_requests SET
            status = COALESCE($2, status),
            staff_notes = COALESCE($3, staff_notes),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(staff_notes)
    .fetch_optional(pool)
    .await
}

pub async fn delete_refill(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM refill_requests WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
