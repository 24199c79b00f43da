//! HTTP API: router discovery, application assembly and the bundled apps.

pub mod apps;
pub mod bootstrap;
pub mod context;
pub mod cors;
pub mod docs;
pub mod errors;
pub mod factory;
pub mod lifespan;
pub mod middleware;
pub mod registry;

pub use context::{AppState, CurrentUser};
pub use cors::CorsPolicy;
pub use errors::ApiError;
pub use factory::{Application, ApplicationFactory, BuildError, ExceptionHandler};
pub use lifespan::Lifespan;
pub use registry::{
    AppCatalog, AppModule, ModuleLoadError, RegistryConfig, RegistryError, RouteModule,
    RouteModuleLoader, RouterRegistration, RouterRegistry,
};
