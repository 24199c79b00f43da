//! Postgres connection pool, connection-string validation and schema
//! migrations.

mod config;
mod migrations;
mod pool;

pub use config::DatabaseConfig;
pub use migrations::{MIGRATIONS, Migration};
pub use pool::Database;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("invalid database url: {0}")]
    InvalidUrl(String),

    #[error("migration {version} ({description}) failed: {source}")]
    Migration {
        version: i32,
        description: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
