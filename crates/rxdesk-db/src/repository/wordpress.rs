//! WordPress integration settings (single row, seeded by the migration).

use rxdesk_common::models::wordpress::WordPressSettings;
use sqlx::PgPool;

pub async fn get_settings(pool: &PgPool) -> Result<WordPressSettings, sqlx::Error> {
    sqlx::query_as::<_, WordPressSettings>("SELECT * FROM wordpress_settings WHERE id = 1")
        .fetch_one(pool)
        .await
}

pub async fn save_settings(pool: &PgPool, s: &WordPressSettings) -> Result<WordPressSettings, sqlx::Error> {
    sqlx::query_as::<_, WordPressSettings>(
        r#"
        UPDATE wordpress_settings SET
            enabled = $1,
            site_url = $2,
            username = $3,
            app_password = $4,
            wc_consumer_key = $5,
            wc_consumer_secret = $6,
            webhook_secret = $7,
            sync_posts = $8,
            sync_products = $9,
            updated_at = NOW()
        WHERE id = 1
        RETURNING *
        "#,
    )
    .bind(s.enabled)
    .bind(&s.site_url)
    .bind(&s.username)
    .bind(&s.app_password)
    .bind(&s.wc_consumer_key)
    .bind(&s.wc_consumer_secret)
    .bind(&s.webhook_secret)
    .bind(s.sync_posts)
    .bind(s.sync_products)
    .fetch_one(pool)
    .await
}

pub async fn touch_last_sync(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE wordpress_settings SET last_sync_at = NOW() WHERE id = 1")
        .execute(pool)
        .await?;
    Ok(())
}
