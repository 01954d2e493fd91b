//! Configuration loading with layered overrides.
//!
//! Config is loaded in order (each layer overrides the previous):
//! 1. Default values
//! 2. Config file (TOML)
//! 3. Environment variables
//! 4. Explicit overrides from the host (usually CLI arguments)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::permission::PermissionLevel;

/// Default bound on parent hops when loading chains.
pub const DEFAULT_MAX_DEPTH: u32 = 256;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub resolution: Resolution,
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data.db".to_string()
}

/// Resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// Maximum parent hops followed from a resource towards its root.
    /// Deeper (or cyclic) trees resolve to `NoAccess`.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Level checked by `user_can_access` when the caller names none.
    #[serde(default = "default_required")]
    pub default_required: PermissionLevel,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            default_required: default_required(),
        }
    }
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_required() -> PermissionLevel {
    PermissionLevel::CanView
}

/// Builder for loading configuration with customizable options.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix (e.g., "MYAPP" -> MYAPP_MAX_DEPTH)
    pub env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            env_prefix: "GRANTREE".to_string(),
        }
    }
}

impl ConfigLoader {
    /// Create a new config loader with the given environment prefix.
    pub fn new(env_prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: env_prefix.into(),
        }
    }

    /// Load configuration from file, environment, and explicit overrides.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `cli_database_url` - Override for the database URL
    /// * `cli_max_depth` - Override for the maximum chain depth
    pub fn load(
        &self,
        config_path: Option<&Path>,
        cli_database_url: Option<&str>,
        cli_max_depth: Option<u32>,
    ) -> crate::Result<Config> {
        let mut config: Config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?
        } else {
            Config {
                database: Database::default(),
                resolution: Resolution::default(),
            }
        };

        let prefix = &self.env_prefix;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(depth) = std::env::var(format!("{prefix}_MAX_DEPTH")) {
            config.resolution.max_depth = depth
                .parse()
                .map_err(|e| Error::Config(format!("{prefix}_MAX_DEPTH: {e}")))?;
        }
        if let Ok(level) = std::env::var(format!("{prefix}_DEFAULT_REQUIRED")) {
            config.resolution.default_required = level
                .parse()
                .map_err(|e| Error::Config(format!("{prefix}_DEFAULT_REQUIRED: {e}")))?;
        }

        if let Some(url) = cli_database_url {
            config.database.url = url.to_string();
        }
        if let Some(depth) = cli_max_depth {
            config.resolution.max_depth = depth;
        }

        if config.resolution.max_depth == 0 {
            return Err(Error::Config("resolution.max_depth must be at least 1".into()));
        }

        Ok(config)
    }
}
