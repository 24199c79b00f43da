use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use tracing::info;
use utoipa::OpenApi;

use launchpad_auth::Password;

use super::dto::{LoginRequest, MeResponse, TokenResponse};
use crate::context::{AppState, CurrentUser};
use crate::errors::ApiError;

#[derive(OpenApi)]
#[openapi(
    paths(login_for_access_token, me),
    components(schemas(LoginRequest, TokenResponse, MeResponse))
)]
pub struct UsersApi;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/token", post(login_for_access_token))
        .route("/me", get(me))
}

/// Exchange a username and password for a bearer token.
#[utoipa::path(
    post,
    path = "/token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 401, description = "Incorrect username or password"),
    )
)]
pub async fn login_for_access_token(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state.users.find_by_username(&request.username).await?;

    let authenticated = match user {
        Some(user) => {
            let hash = user.password_hash.clone();
            let pepper = state.pepper.clone();
            let password = request.password;
            let verified = tokio::task::spawn_blocking(move || {
                Password::verify(&password, &hash, &pepper)
            })
            .await
            .map_err(anyhow::Error::from)?;
            verified.then_some(user)
        }
        None => None,
    };

    let Some(user) = authenticated else {
        return Err(ApiError::unauthorized("Incorrect username or password"));
    };

    let access_token = state
        .jwt
        .issue(&user.username)
        .map_err(anyhow::Error::from)?;
    info!(username = %user.username, "access token issued");

    Ok(Json(TokenResponse::bearer(access_token)))
}

/// The user the bearer token was issued to.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Missing, invalid or expired token"),
    )
)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<MeResponse> {
    Json(user.into())
}
