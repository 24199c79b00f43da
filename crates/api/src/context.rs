use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::debug;

use launchpad_auth::{JwtManager, TokenError};
use launchpad_infra::{StorageClient, User, UserRepository};

use crate::errors::ApiError;
use crate::middleware::extract_bearer;

/// Shared state handed to every app router.
#[derive(Clone)]
pub struct AppState {
    pub jwt: Arc<JwtManager>,
    pub users: Arc<dyn UserRepository>,
    pub storage: StorageClient,
    /// Appended to passwords before hashing.
    pub pepper: Arc<str>,
}

impl AppState {
    pub fn new(
        jwt: JwtManager,
        users: Arc<dyn UserRepository>,
        storage: StorageClient,
        pepper: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            jwt: Arc::new(jwt),
            users,
            storage,
            pepper: pepper.into(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("jwt", &self.jwt)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

/// The authenticated user behind the request's bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = extract_bearer(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let claims = state.jwt.decode(token).map_err(|err| {
            debug!(error = %err, "rejected bearer token");
            match err {
                TokenError::Expired => ApiError::unauthorized("Token has expired"),
                _ => ApiError::unauthorized("Could not validate credentials"),
            }
        })?;

        let user = state
            .users
            .find_by_username(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;

        Ok(CurrentUser(user))
    }
}
