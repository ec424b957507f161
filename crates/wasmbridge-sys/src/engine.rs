use tracing::debug;
use wasmtime::{Config, Engine, OptLevel};

use crate::{handle_result, wb_error_t};

/// Mutable builder for an engine.
pub struct wb_config_t {
    pub(crate) config: Config,
}

pub type wb_opt_level_t = u8;
pub const WB_OPT_LEVEL_NONE: wb_opt_level_t = 0;
pub const WB_OPT_LEVEL_SPEED: wb_opt_level_t = 1;
pub const WB_OPT_LEVEL_SPEED_AND_SIZE: wb_opt_level_t = 2;

pub extern "C" fn wb_config_new() -> Box<wb_config_t> {
    Box::new(wb_config_t {
        config: Config::new(),
    })
}

pub extern "C" fn wb_config_delete(_config: Box<wb_config_t>) {}

macro_rules! bool_setters {
    ($($name:ident => $method:ident;)*) => {$(
        pub extern "C" fn $name(c: &mut wb_config_t, enable: bool) {
            c.config.$method(enable);
        }
    )*};
}

bool_setters! {
    wb_config_consume_fuel_set => consume_fuel;
    wb_config_epoch_interruption_set => epoch_interruption;
    wb_config_debug_info_set => debug_info;
    wb_config_wasm_reference_types_set => wasm_reference_types;
    wb_config_wasm_simd_set => wasm_simd;
    wb_config_wasm_bulk_memory_set => wasm_bulk_memory;
    wb_config_wasm_multi_value_set => wasm_multi_value;
    wb_config_wasm_multi_memory_set => wasm_multi_memory;
    wb_config_wasm_memory64_set => wasm_memory64;
    wb_config_wasm_threads_set => wasm_threads;
}

pub extern "C" fn wb_config_cranelift_opt_level_set(c: &mut wb_config_t, level: wb_opt_level_t) {
    c.config.cranelift_opt_level(match level {
        WB_OPT_LEVEL_NONE => OptLevel::None,
        WB_OPT_LEVEL_SPEED_AND_SIZE => OptLevel::SpeedAndSize,
        _ => OptLevel::Speed,
    });
}

pub extern "C" fn wb_config_max_wasm_stack_set(c: &mut wb_config_t, size: usize) {
    c.config.max_wasm_stack(size);
}

/// A compilation and runtime environment shared by stores and modules.
pub struct wb_engine_t {
    pub(crate) engine: Engine,
}

pub extern "C" fn wb_engine_new_with_config(
    config: Box<wb_config_t>,
    engine_ret: &mut *mut wb_engine_t,
) -> Option<Box<wb_error_t>> {
    handle_result(Engine::new(&config.config), |engine| {
        debug!("native engine created");
        *engine_ret = Box::into_raw(Box::new(wb_engine_t { engine }));
    })
}

pub extern "C" fn wb_engine_increment_epoch(engine: &wb_engine_t) {
    engine.engine.increment_epoch();
}

pub extern "C" fn wb_engine_delete(_engine: Box<wb_engine_t>) {}
