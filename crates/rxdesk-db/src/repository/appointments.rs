//! Appointment repository.

use chrono::NaiveDate;
use rxdesk_common::models::appointment::{
    Appointment, AppointmentFilter, AppointmentStatus, CreateAppointmentRequest,
};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_appointment(
    pool: &PgPool,
    id: Uuid,
    user_id: Option<Uuid>,
    req: &CreateAppointmentRequest,
) -> Result<Appointment, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        r#"
        INSERT INTO appointments (
            id, user_id, name, email, phone, service_type, preferred_date, preferred_time,
            status, notes, created_at, updated_at
        )
        VALUES ($1, $2, $3, LOWER($4), $5, $6, $7, $8, 'pending', $9, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(req.name.trim())
    .bind(&req.email)
    .bind(&req.phone)
    .bind(req.service_type)
    .bind(req.preferred_date)
    .bind(&req.preferred_time)
    .bind(req.notes.as_deref())
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments WHERE user_id = $1 ORDER BY preferred_date DESC, preferred_time DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Staff schedule view, soonest first.
pub async fn list_appointments(
    pool: &PgPool,
    filter: &AppointmentFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Appointment>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, Appointment>(
        r#"
        SELECT * FROM appointments
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::date IS NULL OR preferred_date = $2)
        ORDER BY preferred_date, preferred_time
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(filter.status)
    .bind(filter.date)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM appointments
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::date IS NULL OR preferred_date = $2)
        "#,
    )
    .bind(filter.status)
    .bind(filter.date)
    .fetch_one(pool)
    .await?;

    Ok((rows, total.0))
}

pub async fn update_appointment(
    pool: &PgPool,
    id: Uuid,
    status: Option<AppointmentStatus>,
    preferred_date: Option<NaiveDate>,
    preferred_time: Option<&str>,
    staff_notes: Option<&str>,
) -> Result<Option<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        r#"
        UPDATE appointments SET
            status = COALESCE($2, status),
            preferred_date = COALESCE($3, preferred_date),
            preferred_time = COALESCE($4, preferred_time),
            staff_notes = COALESCE($5, staff_notes),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(preferred_date)
    .bind(preferred_time)
    .bind(staff_notes)
    .fetch_optional(pool)
    .await
}

pub async fn delete_appointment(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
