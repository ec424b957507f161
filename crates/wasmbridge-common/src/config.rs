//! Configuration structures for wasmbridge.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Engine compilation and feature settings
//! - [`ExecutionConfig`]: Per-store execution limits (fuel, epoch deadline)

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-store execution configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Code generation optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No optimizations.
    None,
    /// Optimize for speed.
    #[default]
    Speed,
    /// Optimize for speed and code size.
    SpeedAndSize,
}

/// Engine configuration.
///
/// An engine is immutable once built, so these settings are fixed for every
/// store and module created from it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable fuel metering.
    ///
    /// Stores created from the engine must be given fuel before wasm runs.
    #[serde(default = "defaults::consume_fuel")]
    pub consume_fuel: bool,

    /// Enable epoch-based interruption.
    #[serde(default = "defaults::epoch_interruption")]
    pub epoch_interruption: bool,

    /// Emit DWARF debug information for compiled code.
    #[serde(default)]
    pub debug_info: bool,

    /// Code generation optimization level.
    #[serde(default)]
    pub opt_level: OptLevel,

    /// Maximum native stack available to wasm, in bytes.
    #[serde(default)]
    pub max_wasm_stack: Option<usize>,

    /// WebAssembly proposal toggles.
    #[serde(default)]
    pub features: WasmFeatures,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            consume_fuel: defaults::consume_fuel(),
            epoch_interruption: defaults::epoch_interruption(),
            debug_info: false,
            opt_level: OptLevel::default(),
            max_wasm_stack: None,
            features: WasmFeatures::default(),
        }
    }
}

/// WebAssembly proposal toggles.
///
/// `None` keeps the engine's own default for that proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WasmFeatures {
    /// Reference types (`funcref`/`externref` values, multiple tables).
    pub reference_types: Option<bool>,
    /// Fixed-width SIMD.
    pub simd: Option<bool>,
    /// Bulk memory operations.
    pub bulk_memory: Option<bool>,
    /// Multiple results and block parameters.
    pub multi_value: Option<bool>,
    /// Multiple memories per module.
    pub multi_memory: Option<bool>,
    /// 64-bit memories.
    pub memory64: Option<bool>,
    /// Threads and shared memories.
    pub threads: Option<bool>,
}

/// Per-store execution configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Fuel given to a new store. Requires `consume_fuel` on the engine.
    #[serde(default)]
    pub fuel: Option<u64>,

    /// Epoch deadline, in ticks past the current epoch. Requires
    /// `epoch_interruption` on the engine.
    #[serde(default)]
    pub epoch_deadline: Option<u64>,
}

impl EngineConfig {
    /// Check that the execution settings can be honored by this engine.
    pub fn supports(&self, execution: &ExecutionConfig) -> Result<(), crate::Error> {
        if execution.fuel.is_some() && !self.consume_fuel {
            return Err(crate::Error::invalid_config(
                "fuel was configured but the engine does not consume fuel",
            ));
        }
        if execution.epoch_deadline.is_some() && !self.epoch_interruption {
            return Err(crate::Error::invalid_config(
                "an epoch deadline was configured but epoch interruption is disabled",
            ));
        }
        Ok(())
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn consume_fuel() -> bool {
        false
    }

    pub const fn epoch_interruption() -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert!(!config.engine.consume_fuel);
        assert!(!config.engine.epoch_interruption);
        assert!(!config.engine.debug_info);
        assert_eq!(config.engine.opt_level, OptLevel::Speed);
        assert_eq!(config.engine.max_wasm_stack, None);
        assert_eq!(config.engine.features, WasmFeatures::default());

        assert_eq!(config.execution.fuel, None);
        assert_eq!(config.execution.epoch_deadline, None);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = RuntimeConfig::default();
        config.engine.opt_level = OptLevel::SpeedAndSize;
        config.execution.fuel = Some(1_000);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("speed_and_size"));

        let deserialized: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.engine.opt_level, OptLevel::SpeedAndSize);
        assert_eq!(deserialized.execution.fuel, Some(1_000));
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"engine": {"consume_fuel": true, "features": {"simd": false}}}"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();

        // Explicitly set value
        assert!(config.engine.consume_fuel);
        assert_eq!(config.engine.features.simd, Some(false));
        // Default values for unspecified fields
        assert_eq!(config.engine.features.threads, None);
        assert!(!config.engine.epoch_interruption);
        assert_eq!(config.execution.fuel, None);
    }

    #[test]
    fn test_engine_supports_execution() {
        let engine = EngineConfig::default();
        assert!(engine.supports(&ExecutionConfig::default()).is_ok());

        let fueled = ExecutionConfig {
            fuel: Some(10),
            ..Default::default()
        };
        assert!(engine.supports(&fueled).is_err());

        let engine = EngineConfig {
            consume_fuel: true,
            ..Default::default()
        };
        assert!(engine.supports(&fueled).is_ok());

        let deadline = ExecutionConfig {
            epoch_deadline: Some(1),
            ..Default::default()
        };
        assert!(engine.supports(&deadline).is_err());
    }
}
