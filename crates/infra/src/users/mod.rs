//! User accounts: model, repository contract and its implementations.

mod in_memory;
mod postgres;
mod seed;

pub use in_memory::InMemoryUserRepository;
pub use postgres::PgUserRepository;
pub use seed::{ADMIN_USERNAME, seed_admin};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

/// Input for [`UserRepository::create`]; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("user `{0}` already exists")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence contract for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    /// Fails with [`RepositoryError::Conflict`] when the username is taken.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;
}
