//! Runtime configuration.
//!
//! Sources, later ones winning: built-in defaults, the TOML file, then
//! `GATELINK_` environment variables (nested keys separated by `__`, e.g.
//! `GATELINK_LINK__PORT_NAME=/dev/ttyUSB0`). Command-line flags are applied
//! last by the caller.

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use gatelink_access::GatewayConfig;
use gatelink_core::LinkConfig;
use gatelink_storage::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "gatelink.toml";
const ENV_PREFIX: &str = "GATELINK_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("config file not found: {}", .0.display())]
    Missing(PathBuf),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let defaults = DatabaseConfig::default();
        Self {
            path: defaults.database_path,
            max_connections: defaults.max_connections,
        }
    }
}

impl DatabaseSettings {
    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.path)
            .max_connections(self.max_connections)
            .min_connections(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatelinkConfig {
    pub link: LinkConfig,
    pub database: DatabaseSettings,

    /// How long shutdown waits for pending access log writes.
    pub shutdown_grace_ms: u64,

    pub frame_queue_capacity: usize,
}

impl Default for GatelinkConfig {
    fn default() -> Self {
        let gateway = GatewayConfig::default();
        Self {
            link: gateway.link,
            database: DatabaseSettings::default(),
            shutdown_grace_ms: 5000,
            frame_queue_capacity: gateway.frame_queue_capacity,
        }
    }
}

impl GatelinkConfig {
    /// Load from `path` and the environment.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.exists() => return Err(ConfigError::Missing(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Self::default()))
                .merge(Toml::file(file))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            link: self.link.clone(),
            frame_queue_capacity: self.frame_queue_capacity,
            ..Default::default()
        }
    }
}
