//! Contact form repository.

use rxdesk_common::models::contact::{ContactForm, ContactStatus, CreateContactRequest};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_contact(
    pool: &PgPool,
    id: Uuid,
    req: &CreateContactRequest,
) -> Result<ContactForm, sqlx::Error> {
    sqlx::query_as::<_, ContactForm>(
        r#"
        INSERT INTO contact_forms (id, name, email, phone, subject, message, status, created_at, updated_at)
        VALUES ($1, $2, LOWER($3), $4, $5, $6, 'new', NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.name.trim())
    .bind(&req.email)
    .bind(req.phone.as_deref())
    .bind(req.subject.as_deref())
    .bind(req.message.trim())
    .fetch_one(pool)
    .await
}

pub async fn list_contacts(
    pool: &PgPool,
    status: Option<ContactStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ContactForm>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, ContactForm>(
        r#"
        SELECT * FROM contact_forms
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
        sqlx::query_as("SELECT COUNT(*) FROM contact_forms WHERE ($1::text IS NULL OR status = $1)")
            .bind(status)
            .fetch_one(pool)
            .await?;

    Ok((rows, total.0))
}

pub async fn set_status(
    pool: &PgPool,
    id: Uuid,
    status: ContactStatus,
) -> Result<Option<ContactForm>, sqlx::Error> {
    sqlx::query_as::<_, ContactForm>(
        "UPDATE contact_forms SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await
}

pub async fn delete_contact(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contact_forms WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
