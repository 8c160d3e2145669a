//! # rxdesk-db
//!
//! Database layer for rxdesk. Everything relational lives in **PostgreSQL**:
//! accounts, catalog, carts, orders, pharmacy requests, notifications and
//! settings. Repositories are plain async functions over a `PgPool` (or a
//! transaction connection where a flow must be atomic).

pub mod postgres;
pub mod repository;

use anyhow::Result;
use sqlx::PgPool;

/// Shared database state passed through Axum extractors.
#[derive(Clone)]
pub struct Database {
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL.
    pub async fn connect(config: &rxdesk_common::config::AppConfig) -> Result<Self> {
        tracing::info!("Connecting to PostgreSQL...");
        let pg = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await?;

        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pg })
    }

    /// Wrap an existing pool (tests, tooling).
    pub fn from_pool(pg: PgPool) -> Self {
        Self { pg }
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pg).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }
}
