//! Downlink configuration.
//!
//! Read from the `[downlink]` table of a TOML file; environment variables
//! override file values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of callbacks run concurrently.
pub const DEFAULT_POOL_SIZE: usize = 8;
/// Default exchange timeout when a command carries none.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Environment overrides.
pub mod env_vars {
    pub const POOL_SIZE: &str = "DOWNLINK_POOL_SIZE";
    pub const TIMEOUT_MS: &str = "DOWNLINK_TIMEOUT_MS";

    pub fn pool_size() -> Option<usize> {
        std::env::var(POOL_SIZE).ok().and_then(|s| s.parse().ok())
    }

    pub fn timeout_ms() -> Option<u64> {
        std::env::var(TIMEOUT_MS).ok().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownlinkConfig {
    /// Callback pool size
    pub downlink_pool_size: usize,
    /// Exchange timeout used when a command has none
    pub timeout_ms: u64,
    /// Log every submitted request
    pub log_requests: bool,
}

impl Default for DownlinkConfig {
    fn default() -> Self {
        Self {
            downlink_pool_size: DEFAULT_POOL_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            log_requests: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    downlink: DownlinkConfig,
}

impl DownlinkConfig {
    /// Parse the `[downlink]` table. A missing table yields defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        file.downlink.validate()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply `DOWNLINK_*` environment variables and re-validate.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(size) = env_vars::pool_size() {
            self.downlink_pool_size = size;
        }
        if let Some(timeout) = env_vars::timeout_ms() {
            self.timeout_ms = timeout;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.downlink_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "downlink_pool_size must be greater than 0".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(self)
    }
}
