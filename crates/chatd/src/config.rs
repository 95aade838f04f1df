//! Server configuration.
//!
//! Values come from built-in defaults, optionally overlaid by a TOML file.
//! The binary applies environment and CLI overrides on top.
//!
//! ```toml
//! bind = "0.0.0.0:59001"
//! max_connections = 500
//! outbound_buffer = 256
//! write_timeout_secs = 10
//! max_line_length = 65536
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use chat_protocol::DEFAULT_PORT;

/// Default number of concurrently running connection handlers.
pub const DEFAULT_MAX_CONNECTIONS: usize = 500;

/// Default per-session outbound queue length, in lines.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Default socket write timeout, in seconds.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;

/// Default maximum accepted client line length, in bytes (64 KiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 65_536;

/// Configuration for the chat server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind: String,

    /// Upper bound on concurrently running connection handlers.
    pub max_connections: usize,

    /// Lines queued per session before the session is evicted as too slow.
    pub outbound_buffer: usize,

    /// Seconds a single socket write may take before the session is closed.
    pub write_timeout_secs: u64,

    /// Longest client line accepted, excluding the line ending.
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{DEFAULT_PORT}"),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ServerConfig {
    /// Parses and validates a TOML document. Missing keys use defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Rejects values that would stall or disable the server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::invalid("bind", "must not be empty"));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::invalid("max_connections", "must be at least 1"));
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::invalid("outbound_buffer", "must be at least 1"));
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::invalid("write_timeout_secs", "must be at least 1"));
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::invalid("max_line_length", "must be at least 1"));
        }
        Ok(())
    }

    /// Socket write timeout as a `Duration`.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {error}", path.display())]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    Serialize(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: &'static str },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}
