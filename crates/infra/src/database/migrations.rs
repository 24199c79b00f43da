//! Versioned schema migrations.
//!
//! Applied versions are tracked in `schema_migrations` so each migration
//! runs exactly once, in order.

use sqlx::{Executor, PgConnection, PgPool};
use tracing::{debug, info};

use super::DatabaseError;

#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique, strictly increasing version number.
    pub version: i32,
    pub description: &'static str,
    pub up_sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Create users table",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(255) NOT NULL UNIQUE,
                password VARCHAR(255) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                edited_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Touch users.edited_at on update",
        up_sql: r#"
            CREATE OR REPLACE FUNCTION touch_edited_at() RETURNS TRIGGER AS $$
            BEGIN
                NEW.edited_at = NOW();
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql;

            DROP TRIGGER IF EXISTS users_touch_edited_at ON users;
            CREATE TRIGGER users_touch_edited_at
                BEFORE UPDATE ON users
                FOR EACH ROW EXECUTE FUNCTION touch_edited_at();
        "#,
    },
];

/// Serialises concurrent migrators: each migration runs inside a
/// transaction holding this advisory lock.
const MIGRATION_LOCK_KEY: i64 = 0x4c61_756e_6368;

const TRACKING_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        description TEXT NOT NULL,
        applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
"#;

pub(super) async fn run(pool: &PgPool) -> Result<usize, DatabaseError> {
    let mut count = 0;
    for migration in MIGRATIONS {
        if apply(pool, migration).await? {
            count += 1;
        }
    }

    if count > 0 {
        info!(applied = count, "database migrations applied");
    } else {
        debug!("database schema is up to date");
    }
    Ok(count)
}

/// Applies `migration` unless another instance already has.
async fn apply(pool: &PgPool, migration: &'static Migration) -> Result<bool, DatabaseError> {
    let mut tx = pool.begin().await?;
    let conn: &mut PgConnection = &mut tx;

    conn.execute(sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(MIGRATION_LOCK_KEY))
        .await?;
    conn.execute(sqlx::raw_sql(TRACKING_TABLE_SQL)).await?;

    let applied: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM schema_migrations WHERE version = $1)")
            .bind(migration.version)
            .fetch_one(&mut *conn)
            .await?;
    if applied {
        tx.rollback().await?;
        return Ok(false);
    }

    debug!(version = migration.version, "applying migration: {}", migration.description);
    if let Err(source) = conn.execute(sqlx::raw_sql(migration.up_sql)).await {
        return Err(migration_error(migration, source));
    }
    if let Err(source) = conn
        .execute(
            sqlx::query("INSERT INTO schema_migrations (version, description) VALUES ($1, $2)")
                .bind(migration.version)
                .bind(migration.description),
        )
        .await
    {
        return Err(migration_error(migration, source));
    }

    tx.commit().await?;
    Ok(true)
}

fn migration_error(migration: &'static Migration, source: sqlx::Error) -> DatabaseError {
    DatabaseError::Migration {
        version: migration.version,
        description: migration.description,
        source,
    }
}
