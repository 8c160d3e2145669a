//! Prescription repository.

use chrono::NaiveDate;
use rxdesk_common::models::prescription::{Prescription, PrescriptionStatus};
use sqlx::PgPool;
use uuid::Uuid;

pub struct NewPrescription<'a> {
    pub user_id: Uuid,
    pub patient_name: &'a str,
    pub date_of_birth: Option<NaiveDate>,
    pub doctor_name: Option<&'a str>,
    pub doctor_phone: Option<&'a str>,
    pub medication: Option<&'a str>,
    pub dosage: Option<&'a str>,
    pub file_path: &'a str,
    pub original_filename: &'a str,
    pub content_type: &'a str,
}

pub async fn create_prescription(
    pool: &PgPool,
    id: Uuid,
    p: NewPrescription<'_>,
) -> Result<Prescription, sqlx::Error> {
    sqlx::query_as::<_, Prescription>(
        r#"
        INSERT INTO prescriptions (
            id, user_id, patient_name, date_of_birth, doctor_name, doctor_phone,
            medication, dosage, file_path, original_filename, content_type,
            status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(p.user_id)
    .bind(p.patient_name)
    .bind(p.date_of_birth)
    .bind(p.doctor_name)
    .bind(p.doctor_phone)
    .bind(p.medication)
    .bind(p.dosage)
    .bind(p.file_path)
    .bind(p.original_filename)
    .bind(p.content_type)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Prescription>, sqlx::Error> {
    sqlx::query_as::<_, Prescription>("SELECT * FROM prescriptions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// `user_id` scopes to one customer; `None` is the staff queue.
pub async fn list_prescriptions(
    pool: &PgPool,
    user_id: Option<Uuid>,
    status: Option<PrescriptionStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Prescription>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, Prescription>(
        r#"
        SELECT * FROM prescriptions
        WHERE ($1::uuid IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM prescriptions
        WHERE ($1::uuid IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR status = $2)
        "#,
    )
    .bind(user_id)
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok((rows, total.0))
}

/// Record a pharmacist's decision.
pub async fn review(
    pool: &PgPool,
    id: Uuid,
    status: PrescriptionStatus,
    pharmacist_notes: Option<&str>,
    reviewed_by: Uuid,
) -> Result<Option<Prescription>, sqlx::Error> {
    sqlx::query_as::<_, Prescription>(
        r#"
        UPDATE prescriptions SET
            status = $2,
            pharmacist_notes = COALESCE($3, pharmacist_notes),
            reviewed_by = $4,
            reviewed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(pharmacist_notes)
    .bind(reviewed_by)
    .fetch_optional(pool)
    .await
}

pub async fn delete_prescription(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM prescriptions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
