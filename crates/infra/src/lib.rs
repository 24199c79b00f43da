//! `launchpad-infra`: adapters for the external systems an app talks to:
//! the relational database, the user table and S3-compatible object storage.

pub mod database;
pub mod storage;
pub mod users;

pub use database::{Database, DatabaseConfig, DatabaseError};
pub use storage::{StorageClient, StorageError, random_filename};
pub use users::{InMemoryUserRepository, NewUser, PgUserRepository, RepositoryError, User, UserRepository};
