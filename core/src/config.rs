//! Session controller configuration
//!
//! Only runtime plumbing is configurable. The service name both roles use is
//! the fixed `role::SERVICE_NAME`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::logging::LogSettings;

/// Largest service-specific payload a NAN follow-up frame carries
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 255;

const MAX_EVENT_CAPACITY: usize = 65_536;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Buffered host events before the controller waits on the host
    pub event_capacity: usize,
    /// Largest payload accepted by `send_message`
    pub max_message_len: usize,
    pub logging: LogSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: 64,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            logging: LogSettings::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 || self.event_capacity > MAX_EVENT_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "event_capacity must be 1-{}, got {}",
                MAX_EVENT_CAPACITY, self.event_capacity
            )));
        }
        if self.max_message_len == 0 {
            return Err(ConfigError::Invalid(
                "max_message_len must be > 0".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "logging.level cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }
}
