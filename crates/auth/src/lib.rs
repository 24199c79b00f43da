//! `launchpad-auth`: access tokens and password hashing.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod jwt;
pub mod password;

pub use claims::{AccessClaims, TokenValidationError, validate_claims};
pub use jwt::{JwtManager, TokenError};
pub use password::{Password, PasswordError};
