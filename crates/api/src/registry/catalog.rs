use axum::Router;
use utoipa::openapi::OpenApi;

use super::{Loaded, ModuleLoadError, RouteModule, RouteModuleLoader};

/// The plugin interface each bundled app exports.
pub trait AppModule<S>: Send + Sync {
    /// Must equal the app's directory name.
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the app ships a routes module without a router.
    fn router(&self) -> Result<Option<Router<S>>, ModuleLoadError>;

    fn openapi(&self) -> Option<OpenApi> {
        None
    }
}

/// Apps compiled into the binary, looked up by directory name.
pub struct AppCatalog<S> {
    modules: Vec<Box<dyn AppModule<S>>>,
}

impl<S> Default for AppCatalog<S> {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
        }
    }
}

impl<S> AppCatalog<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookups return the first module registered under a name.
    pub fn with(mut self, module: impl AppModule<S> + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn AppModule<S>> {
        self.modules
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.modules.iter().map(|m| m.name())
    }
}

impl<S> RouteModuleLoader<S> for AppCatalog<S> {
    fn load(&self, module: &RouteModule) -> Result<Option<Loaded<S>>, ModuleLoadError> {
        let app = self
            .get(&module.name)
            .ok_or_else(|| ModuleLoadError::NotInCatalog(module.name.clone()))?;

        Ok(app.router()?.map(|router| Loaded {
            router,
            openapi: app.openapi(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::routing::get;

    use super::*;

    struct Echo;

    impl AppModule<()> for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn router(&self) -> Result<Option<Router<()>>, ModuleLoadError> {
            Ok(Some(Router::new().route("/", get(|| async { "echo" }))))
        }
    }

    struct Helpers;

    impl AppModule<()> for Helpers {
        fn name(&self) -> &'static str {
            "helpers"
        }

        fn router(&self) -> Result<Option<Router<()>>, ModuleLoadError> {
            Ok(None)
        }
    }

    fn module(name: &str) -> RouteModule {
        RouteModule {
            name: name.to_string(),
            path: PathBuf::from("apps").join(name),
        }
    }

    #[test]
    fn catalog_resolves_by_directory_name() {
        let catalog = AppCatalog::new().with(Echo).with(Helpers);

        assert_eq!(catalog.names().collect::<Vec<_>>(), ["echo", "helpers"]);
        assert!(catalog.load(&module("echo")).unwrap().is_some());
        assert!(catalog.load(&module("helpers")).unwrap().is_none());
    }

    #[test]
    fn uncompiled_app_is_an_error() {
        let catalog = AppCatalog::<()>::new().with(Echo);

        assert!(matches!(
            catalog.load(&module("billing")),
            Err(ModuleLoadError::NotInCatalog(name)) if name == "billing"
        ));
    }
}
