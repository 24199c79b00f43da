//! Password hashing with an application-wide pepper.
//!
//! The pepper is appended to the password before hashing. Verification also
//! accepts hashes created without a pepper so older rows keep working.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand_core::OsRng;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),
}

pub struct Password;

impl Password {
    pub fn hash(password: &str, pepper: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let peppered = format!("{password}{pepper}");

        Argon2::default()
            .hash_password(peppered.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// A malformed stored hash never verifies.
    pub fn verify(password: &str, hash: &str, pepper: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::warn!("stored password hash is malformed");
            return false;
        };

        let argon2 = Argon2::default();
        let peppered = format!("{password}{pepper}");
        if argon2.verify_password(peppered.as_bytes(), &parsed).is_ok() {
            return true;
        }

        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_with_same_pepper_only() {
        let hash = Password::hash("hunter2", "pepper").unwrap();

        assert!(Password::verify("hunter2", &hash, "pepper"));
        assert!(!Password::verify("hunter2", &hash, "other"));
        assert!(!Password::verify("wrong", &hash, "pepper"));
    }

    #[test]
    fn hashes_are_salted() {
        let a = Password::hash("hunter2", "pepper").unwrap();
        let b = Password::hash("hunter2", "pepper").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn legacy_unpeppered_hash_still_verifies() {
        let legacy = Password::hash("hunter2", "").unwrap();
        assert!(Password::verify("hunter2", &legacy, "pepper"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!Password::verify("hunter2", "not-a-hash", "pepper"));
    }
}
