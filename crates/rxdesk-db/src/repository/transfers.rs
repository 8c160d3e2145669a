//! Transfer request repository.

use rxdesk_common::models::transfer::{CreateTransferRequest, TransferRequest, TransferStatus};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_transfer(
    pool: &PgPool,
    id: Uuid,
    user_id: Option<Uuid>,
    req: &CreateTransferRequest,
) -> Result<TransferRequest, sqlx::Error> {
    sqlx::query_as::<_, TransferRequest>(
        r#"
        INSERT INTO transfer_requests (
            id, user_id, patient_name, date_of_birth, phone, email, from_pharmacy_name,
            from_pharmacy_phone, rx_numbers, medications, notes, status, created_at, updated_at
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
    .bind(req.from_pharmacy_name.trim())
    .bind(req.from_pharmacy_phone.as_deref())
    .bind(req.rx_numbers.as_deref())
    .bind(req.medications.trim())
    .bind(req.notes.as_deref())
    .fetch_one(pool)
    .await
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<TransferRequest>, sqlx::Error> {
    sqlx::query_as::<_, TransferRequest>(
        "SELECT * FROM transfer_requests WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_transfers(
    pool: &PgPool,
    status: Option<TransferStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<TransferRequest>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, TransferRequest>(
        r#"
        SELECT * FROM transfer_requests
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
        sqlx::query_as("SELECT COUNT(*) FROM transfer_requests WHERE ($1::text IS NULL OR status = $1)")
            .bind(status)
            .fetch_one(pool)
            .await?;

    Ok((rows, total.0))
}

pub async fn update_transfer(
    pool: &PgPool,
    id: Uuid,
    status: Option<TransferStatus>,
    staff_notes: Option<&str>,
) -> Result<Option<TransferRequest>, sqlx::Error> {
    sqlx::query_as::<_, TransferRequest>(
        r#"
        UPDATE transfer_requests SET
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

pub async fn delete_transfer(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM transfer_requests WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
