//! Accounts and bearer-token login.

pub mod dto;
mod routes;

use axum::Router;
use utoipa::OpenApi as _;

use crate::context::AppState;
use crate::registry::{AppModule, ModuleLoadError};

pub use routes::UsersApi;

pub struct UsersApp;

impl AppModule<AppState> for UsersApp {
    fn name(&self) -> &'static str {
        "users"
    }

    fn router(&self) -> Result<Option<Router<AppState>>, ModuleLoadError> {
        Ok(Some(routes::router()))
    }

    fn openapi(&self) -> Option<utoipa::openapi::OpenApi> {
        Some(UsersApi::openapi())
    }
}
