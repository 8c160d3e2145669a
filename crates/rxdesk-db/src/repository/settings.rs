//! Site settings repository.

use rxdesk_common::models::settings::{Setting, SettingEntry};
use sqlx::PgPool;

pub async fn list_all(pool: &PgPool) -> Result<Vec<Setting>, sqlx::Error> {
    sqlx::query_as::<_, Setting>("SELECT * FROM settings ORDER BY key")
        .fetch_all(pool)
        .await
}

pub async fn list_public(pool: &PgPool) -> Result<Vec<Setting>, sqlx::Error> {
    sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE is_public ORDER BY key")
        .fetch_all(pool)
        .await
}

/// Upsert a batch of settings atomically.
pub async fn upsert_many(pool: &PgPool, entries: &[SettingEntry]) -> Result<Vec<Setting>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut saved = Vec::with_capacity(entries.len());

    for entry in entries {
        let setting = sqlx::query_as::<_, Setting>(
            r#"
            INSERT INTO settings (key, value, is_public, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                is_public = EXCLUDED.is_public,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(entry.is_public)
        .fetch_one(&mut *tx)
        .await?;
        saved.push(setting);
    }

    tx.commit().await?;
    Ok(saved)
}

pub async fn delete_setting(pool: &PgPool, key: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM settings WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
