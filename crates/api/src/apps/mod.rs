//! Apps bundled with the binary.
//!
//! Each subdirectory with a `routes.rs` is picked up by the router
//! registry; its module must also be listed in [`catalog`].

pub mod files;
pub mod users;

use std::path::PathBuf;

use crate::context::AppState;
use crate::registry::AppCatalog;

pub fn catalog() -> AppCatalog<AppState> {
    AppCatalog::new().with(files::FilesApp).with(users::UsersApp)
}

/// This directory, used when `APPS_DIR` is unset.
///
/// The path is baked in at compile time and only exists where the crate was
/// built.
pub fn bundled_apps_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/src/apps"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RegistryConfig, RouterRegistry};

    #[test]
    fn every_bundled_app_directory_is_in_the_catalog() {
        let registry = RouterRegistry::new(RegistryConfig::new(bundled_apps_dir())).unwrap();

        let registrations = registry.collect(&catalog()).unwrap();
        let prefixes: Vec<_> = registrations.iter().map(|r| r.prefix.as_str()).collect();

        assert_eq!(prefixes, ["/api/files", "/api/users"]);
        assert!(registrations.iter().all(|r| r.openapi.is_some()));
    }

    #[test]
    fn catalog_names_match_directories() {
        for name in catalog().names() {
            assert!(
                bundled_apps_dir().join(name).join("routes.rs").is_file(),
                "{name} has no routes module on disk"
            );
        }
    }
}
