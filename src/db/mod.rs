//! Database connection pool, migrations, and health check.
//!
//! The broker (pgmq) and the record store are both Postgres. Each gets its
//! own `Db` so they can live on different servers.

pub mod pgmq;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::error::Result;
use crate::supervisor::Lifecycle;

/// Database handle. Owns one connection pool.
pub struct Db {
    name: &'static str,
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    ///
    /// `name` labels the handle in logs and on shutdown.
    pub async fn connect(name: &'static str, url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(db = name, "database connected");
        Ok(Self { name, pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Lifecycle for Db {
    fn name(&self) -> &str {
        self.name
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!(db = self.name, "database pool closed");
        Ok(())
    }
}
