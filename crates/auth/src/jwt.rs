//! HMAC-signed access tokens.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use thiserror::Error;

use launchpad_core::SecuritySettings;

use crate::claims::{AccessClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("unsupported JWT algorithm `{0}` (expected HS256, HS384 or HS512)")]
    UnsupportedAlgorithm(String),

    #[error("JWT secret must not be empty")]
    EmptySecret,

    #[error("token lifetime must be positive")]
    InvalidLifetime,

    #[error("failed to encode token: {0}")]
    Encode(String),
}

/// Issues and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct JwtManager {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtManager")
            .field("algorithm", &self.algorithm)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(algorithm: &str, secret: &str, expiration_minutes: i64) -> Result<Self, TokenError> {
        let algorithm = Algorithm::from_str(algorithm.trim())
            .ok()
            .filter(|alg| matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
            .ok_or_else(|| TokenError::UnsupportedAlgorithm(algorithm.to_string()))?;

        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        if expiration_minutes <= 0 {
            return Err(TokenError::InvalidLifetime);
        }

        Ok(Self {
            algorithm,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(expiration_minutes),
        })
    }

    pub fn from_settings(settings: &SecuritySettings) -> Result<Self, TokenError> {
        Self::new(
            &settings.jwt_algorithm,
            &settings.secret_key,
            settings.jwt_expire_minutes,
        )
    }

    /// Issue a token for `subject`, valid from now for the configured lifetime.
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    pub fn issue_at(&self, subject: &str, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = AccessClaims::new(subject, issued_at, self.ttl);
        jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Verify the signature and time window of `token`.
    pub fn decode(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        match validate_claims(&data.claims, Utc::now()) {
            Ok(()) => Ok(data.claims),
            Err(TokenValidationError::Expired) => Err(TokenError::Expired),
            Err(e) => {
                tracing::debug!(error = %e, "rejecting token claims");
                Err(TokenError::Invalid)
            }
        }
    }
}
