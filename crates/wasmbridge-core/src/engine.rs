//! Engine configuration and creation.
//!
//! The [`Engine`] is the root of everything else. It is:
//! - Immutable once built
//! - Shared by every store and module created from it
//! - Cheap to clone and safe to send across threads

#![allow(unsafe_code)]

use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::{debug, info};
use wasmbridge_common::{EngineConfig, Error, OptLevel};
use wasmbridge_sys::{
    WB_OPT_LEVEL_NONE, WB_OPT_LEVEL_SPEED, WB_OPT_LEVEL_SPEED_AND_SIZE, wb_config_consume_fuel_set,
    wb_config_cranelift_opt_level_set, wb_config_debug_info_set,
    wb_config_epoch_interruption_set, wb_config_max_wasm_stack_set, wb_config_new, wb_config_t,
    wb_config_wasm_bulk_memory_set, wb_config_wasm_memory64_set,
    wb_config_wasm_multi_memory_set, wb_config_wasm_multi_value_set,
    wb_config_wasm_reference_types_set, wb_config_wasm_simd_set, wb_config_wasm_threads_set,
    wb_engine_delete, wb_engine_increment_epoch, wb_engine_new_with_config, wb_engine_t,
};

use crate::native::error_from_native;

/// Shared compilation and runtime environment.
///
/// An engine owns no per-program state. Stores and modules keep a clone of
/// it, so the native engine is released when the last of them is gone.
///
/// # Example
///
/// ```ignore
/// use wasmbridge_common::EngineConfig;
/// use wasmbridge_core::Engine;
///
/// let config = EngineConfig::default();
/// let engine = Engine::new(&config)?;
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    raw: NonNull<wb_engine_t>,
    config: EngineConfig,
}

// The native engine is internally synchronized.
unsafe impl Send for EngineInner {}
unsafe impl Sync for EngineInner {}

impl Drop for EngineInner {
    fn drop(&mut self) {
        wb_engine_delete(unsafe { Box::from_raw(self.raw.as_ptr()) });
    }
}

impl Engine {
    /// Create a new engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the native engine rejects the
    /// combination of settings.
    pub fn new(config: &EngineConfig) -> Result<Self, Error> {
        let mut native = wb_config_new();
        apply_config(&mut native, config);

        let mut raw = ptr::null_mut();
        if let Some(error) = wb_engine_new_with_config(native, &mut raw) {
            return Err(error_from_native(error));
        }
        let raw = NonNull::new(raw).ok_or_else(|| Error::engine("engine creation returned null"))?;

        info!(
            consume_fuel = config.consume_fuel,
            epoch_interruption = config.epoch_interruption,
            opt_level = ?config.opt_level,
            "Engine initialized"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                raw,
                config: config.clone(),
            }),
        })
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Increment the epoch counter.
    ///
    /// Stores with an epoch deadline trap once the counter passes it. Call
    /// this from a timer thread to bound execution time.
    pub fn increment_epoch(&self) {
        wb_engine_increment_epoch(self.native());
    }

    /// Returns `true` if both handles refer to the same engine.
    pub fn same(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn native(&self) -> &wb_engine_t {
        unsafe { self.inner.raw.as_ref() }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
            .unwrap_or_else(|e| panic!("default engine configuration was rejected: {e}"))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("consume_fuel", &self.inner.config.consume_fuel)
            .field("epoch_interruption", &self.inner.config.epoch_interruption)
            .field("opt_level", &self.inner.config.opt_level)
            .finish_non_exhaustive()
    }
}

fn apply_config(native: &mut wb_config_t, config: &EngineConfig) {
    wb_config_consume_fuel_set(native, config.consume_fuel);
    wb_config_epoch_interruption_set(native, config.epoch_interruption);
    wb_config_debug_info_set(native, config.debug_info);
    wb_config_cranelift_opt_level_set(
        native,
        match config.opt_level {
            OptLevel::None => WB_OPT_LEVEL_NONE,
            OptLevel::Speed => WB_OPT_LEVEL_SPEED,
            OptLevel::SpeedAndSize => WB_OPT_LEVEL_SPEED_AND_SIZE,
        },
    );
    if let Some(size) = config.max_wasm_stack {
        wb_config_max_wasm_stack_set(native, size);
    }

    let features = &config.features;
    let toggles: [(Option<bool>, extern "C" fn(&mut wb_config_t, bool)); 7] = [
        (features.reference_types, wb_config_wasm_reference_types_set),
        (features.simd, wb_config_wasm_simd_set),
        (features.bulk_memory, wb_config_wasm_bulk_memory_set),
        (features.multi_value, wb_config_wasm_multi_value_set),
        (features.multi_memory, wb_config_wasm_multi_memory_set),
        (features.memory64, wb_config_wasm_memory64_set),
        (features.threads, wb_config_wasm_threads_set),
    ];
    for (toggle, set) in toggles {
        if let Some(enable) = toggle {
            debug!(enable, "Applying feature toggle");
            set(native, enable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmbridge_common::WasmFeatures;

    #[test]
    fn test_engine_creation_default() {
        let config = EngineConfig::default();
        let engine = Engine::new(&config);

        assert!(engine.is_ok());
        let engine = engine.unwrap();
        assert!(!engine.config().consume_fuel);
    }

    #[test]
    fn test_engine_creation_with_limits() {
        let config = EngineConfig {
            consume_fuel: true,
            epoch_interruption: true,
            opt_level: OptLevel::None,
            ..Default::default()
        };
        let engine = Engine::new(&config).unwrap();

        assert!(engine.config().consume_fuel);
        assert!(engine.config().epoch_interruption);
    }

    #[test]
    fn test_engine_feature_toggles() {
        let config = EngineConfig {
            features: WasmFeatures {
                simd: Some(true),
                multi_memory: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(Engine::new(&config).is_ok());
    }

    #[test]
    fn test_engine_clone_is_same() {
        let engine = Engine::default();
        let clone = engine.clone();
        let other = Engine::default();

        assert!(Engine::same(&engine, &clone));
        assert!(!Engine::same(&engine, &other));
    }

    #[test]
    fn test_engine_epoch_increment() {
        let config = EngineConfig {
            epoch_interruption: true,
            ..Default::default()
        };
        let engine = Engine::new(&config).unwrap();

        // Should not panic
        engine.increment_epoch();
        engine.increment_epoch();
    }

    #[test]
    fn test_engine_debug() {
        let engine = Engine::default();

        let debug_str = format!("{engine:?}");
        assert!(debug_str.contains("Engine"));
        assert!(debug_str.contains("consume_fuel"));
    }
}
