//! Configuration file structures for wasmbridge.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`LoggingConfig`]: Log filter and output format

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RuntimeConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [runtime.engine]
/// consume_fuel = true
/// opt_level = "speed"
///
/// [runtime.engine.features]
/// simd = false
///
/// [runtime.execution]
/// fuel = 10_000_000
///
/// [logging]
/// filter = "info,wasmbridge_core=debug"
/// json = false
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration (engine + execution settings).
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// Logging configuration from config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "defaults::filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: defaults::filter(),
            json: false,
        }
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

/// Default value functions for serde.
mod defaults {
    pub fn filter() -> String {
        "info".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptLevel;

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();

        assert_eq!(config.logging.filter, "info");
        assert!(!config.logging.json);
        assert!(!config.runtime.engine.consume_fuel);
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [logging]
            json = true
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert!(config.logging.json);
        // Defaults applied
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [runtime.engine]
            consume_fuel = true
            epoch_interruption = true
            debug_info = true
            opt_level = "none"
            max_wasm_stack = 1048576

            [runtime.engine.features]
            simd = false
            multi_memory = true

            [runtime.execution]
            fuel = 5_000_000
            epoch_deadline = 10

            [logging]
            filter = "debug"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert!(config.runtime.engine.consume_fuel);
        assert!(config.runtime.engine.epoch_interruption);
        assert!(config.runtime.engine.debug_info);
        assert_eq!(config.runtime.engine.opt_level, OptLevel::None);
        assert_eq!(config.runtime.engine.max_wasm_stack, Some(1_048_576));
        assert_eq!(config.runtime.engine.features.simd, Some(false));
        assert_eq!(config.runtime.engine.features.multi_memory, Some(true));
        assert_eq!(config.runtime.execution.fuel, Some(5_000_000));
        assert_eq!(config.runtime.execution.epoch_deadline, Some(10));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let invalid = "this is not valid toml [";
        let result = ConfigFile::from_toml(invalid);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigFile::from_file("/nonexistent/wasmbridge.toml");
        assert!(matches!(result, Err(ConfigFileError::Io { .. })));
    }
}
