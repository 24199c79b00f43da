//! Router auto-discovery.
//!
//! Every immediate subdirectory of the apps root is a candidate app. A
//! candidate that carries the conventionally named routes file is handed to
//! a [`RouteModuleLoader`], and each router it yields is mounted under a
//! prefix rendered from the app's directory name.

mod catalog;
mod pattern;

pub use catalog::{AppCatalog, AppModule};
pub use pattern::{PatternKind, RoutePattern, title_case};

use std::collections::BTreeSet;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use axum::Router;
use thiserror::Error;
use tracing::{debug, info};
use utoipa::openapi::OpenApi;

use launchpad_core::{
    RoutingSettings,
    settings::{DEFAULT_PREFIX_PATTERN, DEFAULT_TAG_PATTERN},
};

use crate::factory::ApplicationFactory;

pub const DEFAULT_ROUTES_FILE: &str = "routes.rs";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("apps directory `{0}` does not exist")]
    AppsDirMissing(PathBuf),

    #[error("apps path `{0}` is not a directory")]
    NotADirectory(PathBuf),

    #[error("invalid {kind} pattern `{pattern}`: {reason}")]
    Pattern {
        kind: &'static str,
        pattern: String,
        reason: String,
    },

    #[error("app directory name `{0}` is not a valid path segment")]
    InvalidAppName(String),

    #[error("failed to read `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    ModuleLoad(#[from] ModuleLoadError),
}

#[derive(Debug, Error)]
pub enum ModuleLoadError {
    #[error("app `{0}` has a routes module but is not compiled into the app catalog")]
    NotInCatalog(String),

    #[error("app `{app}` failed to load")]
    Failed {
        app: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ModuleLoadError {
    pub fn failed(app: impl Into<String>, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Failed {
            app: app.into(),
            source: source.into(),
        }
    }
}

/// One app directory found under the apps root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteModule {
    pub name: String,
    pub path: PathBuf,
}

/// What a loader hands back for an app that exposes a router.
pub struct Loaded<S> {
    pub router: Router<S>,
    pub openapi: Option<OpenApi>,
}

impl<S> From<Router<S>> for Loaded<S> {
    fn from(router: Router<S>) -> Self {
        Self {
            router,
            openapi: None,
        }
    }
}

/// Resolves a discovered app directory to its router.
///
/// `Ok(None)` means the app has no router and is skipped; `Err` aborts the
/// whole registration pass.
pub trait RouteModuleLoader<S> {
    fn load(&self, module: &RouteModule) -> Result<Option<Loaded<S>>, ModuleLoadError>;
}

impl<S, F> RouteModuleLoader<S> for F
where
    F: Fn(&RouteModule) -> Result<Option<Loaded<S>>, ModuleLoadError>,
{
    fn load(&self, module: &RouteModule) -> Result<Option<Loaded<S>>, ModuleLoadError> {
        self(module)
    }
}

/// A router ready to be mounted by the factory.
pub struct RouterRegistration<S> {
    pub app_name: String,
    pub router: Router<S>,
    pub prefix: String,
    pub tags: BTreeSet<String>,
    pub openapi: Option<OpenApi>,
}

impl<S> RouterRegistration<S> {
    pub fn new(app_name: impl Into<String>, prefix: impl Into<String>, router: Router<S>) -> Self {
        Self {
            app_name: app_name.into(),
            router,
            prefix: prefix.into(),
            tags: BTreeSet::new(),
            openapi: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_openapi(mut self, openapi: OpenApi) -> Self {
        self.openapi = Some(openapi);
        self
    }
}

impl<S> std::fmt::Debug for RouterRegistration<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterRegistration")
            .field("app_name", &self.app_name)
            .field("prefix", &self.prefix)
            .field("tags", &self.tags)
            .field("openapi", &self.openapi.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub apps_dir: PathBuf,
    pub routes_file: String,
    pub prefix_pattern: String,
    pub tag_pattern: String,
}

impl RegistryConfig {
    pub fn new(apps_dir: impl Into<PathBuf>) -> Self {
        Self {
            apps_dir: apps_dir.into(),
            routes_file: DEFAULT_ROUTES_FILE.to_string(),
            prefix_pattern: DEFAULT_PREFIX_PATTERN.to_string(),
            tag_pattern: DEFAULT_TAG_PATTERN.to_string(),
        }
    }

    /// `default_apps_dir` is used when the settings leave the apps root unset.
    pub fn from_settings(settings: &RoutingSettings, default_apps_dir: &Path) -> Self {
        Self {
            apps_dir: settings
                .apps_dir
                .clone()
                .unwrap_or_else(|| default_apps_dir.to_path_buf()),
            routes_file: DEFAULT_ROUTES_FILE.to_string(),
            prefix_pattern: settings.prefix_pattern.clone(),
            tag_pattern: settings.tag_pattern.clone(),
        }
    }

    pub fn with_prefix_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.prefix_pattern = pattern.into();
        self
    }

    pub fn with_tag_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.tag_pattern = pattern.into();
        self
    }

    pub fn with_routes_file(mut self, file_name: impl Into<String>) -> Self {
        self.routes_file = file_name.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct RouterRegistry {
    config: RegistryConfig,
    prefix: RoutePattern,
    tag: RoutePattern,
}

impl RouterRegistry {
    /// Validates both patterns up front; nothing touches the filesystem yet.
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let prefix = RoutePattern::prefix(&config.prefix_pattern)?;
        let tag = RoutePattern::tag(&config.tag_pattern)?;
        Ok(Self {
            config,
            prefix,
            tag,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Immediate app subdirectories, sorted by name.
    pub fn discover(&self) -> Result<Vec<RouteModule>, RegistryError> {
        let root = &self.config.apps_dir;
        if !root.exists() {
            return Err(RegistryError::AppsDirMissing(root.clone()));
        }
        if !root.is_dir() {
            return Err(RegistryError::NotADirectory(root.clone()));
        }

        let io_err = |source: std::io::Error| RegistryError::Io {
            path: root.clone(),
            source,
        };

        let mut modules = Vec::new();
        for entry in std::fs::read_dir(root).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name.starts_with('_') {
                debug!(app = %name, "skipping private directory");
                continue;
            }
            modules.push(RouteModule { name, path });
        }

        modules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(modules)
    }

    /// Loads a registration for every discovered app that has a routes
    /// module and a router, in discovery order.
    pub fn collect<S, L>(&self, loader: &L) -> Result<Vec<RouterRegistration<S>>, RegistryError>
    where
        L: RouteModuleLoader<S> + ?Sized,
    {
        let mut registrations = Vec::new();

        for module in self.discover()? {
            let routes = module.path.join(&self.config.routes_file);
            if !routes.is_file() {
                debug!(app = %module.name, "no routes module, skipping");
                continue;
            }
            if !is_valid_app_name(&module.name) {
                return Err(RegistryError::InvalidAppName(module.name));
            }

            let Some(loaded) = loader.load(&module)? else {
                info!(app = %module.name, "routes module exposes no router, skipping");
                continue;
            };

            let prefix = self.prefix.render(&module.name);
            let tag = self.tag.render(&module.name);
            info!(app = %module.name, prefix = %prefix, tag = %tag, "discovered router");

            registrations.push(RouterRegistration {
                app_name: module.name,
                router: loaded.router,
                prefix,
                tags: BTreeSet::from([tag]),
                openapi: loaded.openapi,
            });
        }

        Ok(registrations)
    }

    /// Collects registrations and includes them into `factory` in order.
    pub fn register<S, L>(
        &self,
        factory: ApplicationFactory<S>,
        loader: &L,
    ) -> Result<ApplicationFactory<S>, RegistryError>
    where
        S: Clone + Send + Sync + 'static,
        L: RouteModuleLoader<S> + ?Sized,
    {
        let registrations = self.collect(loader)?;
        info!(count = registrations.len(), "registering app routers");

        Ok(registrations
            .into_iter()
            .fold(factory, |factory, registration| factory.include(registration)))
    }
}

fn is_valid_app_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
