use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use launchpad_core::DatabaseSettings;

use super::{DatabaseConfig, DatabaseError, migrations};

/// Shared Postgres pool.
///
/// The pool is created lazily: no connection is opened until the first query,
/// so building the application never touches the network.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn connect_lazy(settings: &DatabaseSettings) -> Result<Self, DatabaseError> {
        let config = DatabaseConfig::parse(&settings.url)?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(&settings.url)?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database_name,
            "database pool configured"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query.
    pub async fn check_connection(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Apply pending migrations; returns how many ran.
    pub async fn migrate(&self) -> Result<usize, DatabaseError> {
        migrations::run(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
