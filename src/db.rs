use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(2))
        .idle_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
        .context("connect to database")?;
    info!("connected to database");
    Ok(pool)
}

/// Logs which tables exist and how many rows they hold. Never fails startup.
pub async fn log_schema_summary(pool: &PgPool) {
    let tables = sqlx::query_scalar::<_, String>(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = 'public' AND table_name IN ('users', 'contacts')
        ORDER BY table_name
        "#,
    )
    .fetch_all(pool)
    .await;

    match tables {
        Ok(tables) => info!(?tables, "schema tables present"),
        Err(e) => {
            warn!(error = %e, "could not inspect schema");
            return;
        }
    }

    match PgStore::new(pool.clone()).stats().await {
        Ok(stats) => info!(
            users = stats.user_count,
            contacts = stats.contact_count,
            "row counts"
        ),
        Err(e) => warn!(error = %e, "could not count rows"),
    }
}

/// Diagnostics reported by `/health/db`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStats {
    pub version: String,
    pub user_count: i64,
    pub contact_count: i64,
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Current time as seen by the database.
    async fn db_time(&self) -> anyhow::Result<OffsetDateTime>;

    async fn stats(&self) -> anyhow::Result<DbStats>;
}

#[async_trait]
impl HealthProbe for PgStore {
    async fn db_time(&self) -> anyhow::Result<OffsetDateTime> {
        let now = sqlx::query_scalar::<_, OffsetDateTime>("SELECT now()")
            .fetch_one(&self.pool)
            .await?;
        Ok(now)
    }

    async fn stats(&self) -> anyhow::Result<DbStats> {
        let version = sqlx::query_scalar::<_, String>("SELECT version()")
            .fetch_one(&self.pool)
            .await?;
        let user_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let contact_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contacts")
            .fetch_one(&self.pool)
            .await?;
        Ok(DbStats {
            version,
            user_count,
            contact_count,
        })
    }
}
