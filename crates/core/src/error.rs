//! Configuration error model.

use thiserror::Error;

/// Result type used while loading settings.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings could not be loaded.
///
/// Always fatal at startup: the process must not serve with a partially
/// configured application.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent (or blank).
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    /// A variable is present but cannot be parsed.
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}
