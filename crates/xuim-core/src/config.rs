//! Configuration types for the xuim engine
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location of the x-ui database
pub const DEFAULT_DB_PATH: &str = "/etc/x-ui/x-ui.db";

/// Main xuim configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XuimConfig {
    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl XuimConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration pointing at a SQLite database file
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreConfig::Sqlite {
                path: path.into(),
                busy_timeout_secs: default_busy_timeout_secs(),
                max_connections: default_max_connections(),
                create_if_missing: false,
            },
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        Ok(())
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// SQLite database owned by the panel
    Sqlite {
        /// Path to the database file
        path: PathBuf,

        /// How long a statement waits on a locked database (in seconds)
        #[serde(default = "default_busy_timeout_secs")]
        busy_timeout_secs: u64,

        /// Pool size; one connection keeps every operation on a single
        /// connection
        #[serde(default = "default_max_connections")]
        max_connections: u32,

        /// Create the file when it does not exist (fixtures and development)
        #[serde(default)]
        create_if_missing: bool,
    },

    /// In-memory store (not persistent)
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Sqlite {
                path,
                busy_timeout_secs,
                max_connections,
                ..
            } => {
                if path.as_os_str().is_empty() {
                    return Err(crate::Error::config("SQLite path cannot be empty"));
                }
                if *max_connections == 0 {
                    return Err(crate::Error::config("SQLite max_connections must be > 0"));
                }
                if *busy_timeout_secs > 300 {
                    return Err(crate::Error::config(format!(
                        "SQLite busy timeout must be at most 300 seconds. Got: {}",
                        busy_timeout_secs
                    )));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::Sqlite { .. } => "sqlite",
            StoreConfig::Memory => "memory",
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite {
            path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout_secs: default_busy_timeout_secs(),
            max_connections: default_max_connections(),
            create_if_missing: false,
        }
    }
}

/// How the enablement engine resolves an inbound from a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortPolicy {
    /// Use the inbound with the lowest id when several share a port
    #[default]
    FirstMatch,
    /// Skip targets whose port is shared by several inbounds
    RequireUnique,
}

impl std::str::FromStr for PortPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first_match" | "first-match" => Ok(PortPolicy::FirstMatch),
            "require_unique" | "require-unique" => Ok(PortPolicy::RequireUnique),
            other => Err(crate::Error::config(format!(
                "Unknown port policy '{}'. Valid: first_match, require_unique",
                other
            ))),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Day floor used when a caller asks for "expired for a while" without
    /// naming a number of days
    #[serde(default = "default_min_days_expired")]
    pub default_min_days_expired: u32,

    /// Port lookup policy for enablement targets without an inbound id
    #[serde(default)]
    pub port_policy: PortPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_min_days_expired: default_min_days_expired(),
            port_policy: PortPolicy::default(),
        }
    }
}

fn default_busy_timeout_secs() -> u64 {
    5
}

fn default_max_connections() -> u32 {
    1
}

fn default_min_days_expired() -> u32 {
    30
}
