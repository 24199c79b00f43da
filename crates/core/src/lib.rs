//! `launchpad-core`: configuration shared by every Launchpad crate.
//!
//! No HTTP, storage or database code lives here; only the typed settings
//! tree and its error type.

pub mod error;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{
    CorsSettings, DatabaseSettings, LogFormat, LogSettings, RoutingSettings, SecuritySettings,
    ServerSettings, Settings, StorageSettings,
};
