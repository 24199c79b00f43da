//! Authenticated file storage backed by the object store.

pub mod dto;
mod routes;

use axum::Router;
use utoipa::OpenApi as _;

use crate::context::AppState;
use crate::registry::{AppModule, ModuleLoadError};

pub use routes::FilesApi;

pub struct FilesApp;

impl AppModule<AppState> for FilesApp {
    fn name(&self) -> &'static str {
        "files"
    }

    fn router(&self) -> Result<Option<Router<AppState>>, ModuleLoadError> {
        Ok(Some(routes::router()))
    }

    fn openapi(&self) -> Option<utoipa::openapi::OpenApi> {
        Some(FilesApi::openapi())
    }
}
