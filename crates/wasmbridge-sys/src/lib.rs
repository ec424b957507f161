//! Handle-based native engine API for wasmbridge.
//!
//! Every engine object lives on the heap behind a `wb_*_t` handle and is
//! released with its matching `wb_*_delete`. Operations that touch a store
//! take a [`wb_context_t`], which is either the store itself or the caller
//! of a host function that is currently executing.
//!
//! Host functions are registered as a callback plus an opaque `env` word and
//! an optional finalizer. The finalizer runs exactly once, when the native
//! function object is destroyed together with its store.
//!
//! Fallible operations return `Option<Box<wb_error_t>>`; operations that run
//! wasm additionally report traps through a `*mut wb_trap_t` out-parameter.

#![allow(non_camel_case_types)]
#![allow(unsafe_code)]
#![allow(clippy::missing_safety_doc)]

mod engine;
mod error;
mod r#extern;
mod func;
mod global;
mod instance;
mod memory;
mod module;
mod store;
mod table;
mod trap;
mod types;
mod val;
mod vec;

pub use crate::engine::*;
pub use crate::error::*;
pub use crate::func::*;
pub use crate::global::*;
pub use crate::instance::*;
pub use crate::memory::*;
pub use crate::module::*;
pub use crate::r#extern::*;
pub use crate::store::*;
pub use crate::table::*;
pub use crate::trap::*;
pub use crate::types::*;
pub use crate::val::*;
pub use crate::vec::*;

/// Callback invoked with an `env` word when native data is released.
pub type wb_finalizer_t = extern "C" fn(usize);

/// Runs a host-supplied finalizer over an `env` word when dropped.
pub(crate) struct ForeignData {
    pub(crate) data: usize,
    pub(crate) finalizer: Option<wb_finalizer_t>,
}

impl Drop for ForeignData {
    fn drop(&mut self) {
        if let Some(f) = self.finalizer {
            f(self.data);
        }
    }
}

/// Build a slice from a pointer and length, ignoring `ptr` when `len` is 0.
pub(crate) unsafe fn slice_from_raw_parts<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len) }
    }
}

/// Same as above, but for `*mut`.
pub(crate) unsafe fn slice_from_raw_parts_mut<'a, T>(ptr: *mut T, len: usize) -> &'a mut [T] {
    if len == 0 {
        &mut []
    } else {
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }
}

pub(crate) fn handle_result<T>(
    result: anyhow::Result<T>,
    ok: impl FnOnce(T),
) -> Option<Box<wb_error_t>> {
    match result {
        Ok(value) => {
            ok(value);
            None
        }
        Err(error) => Some(Box::new(wb_error_t::from(error))),
    }
}

/// Split an execution failure into a trap or a plain error.
///
/// Anything raised while wasm frames were on the stack counts as a trap.
pub(crate) fn handle_call_error(
    error: anyhow::Error,
    trap_ret: &mut *mut wb_trap_t,
) -> Option<Box<wb_error_t>> {
    if error.is::<wasmtime::Trap>()
        || error.is::<trap::HostTrap>()
        || error.is::<wasmtime::WasmBacktrace>()
    {
        *trap_ret = Box::into_raw(Box::new(wb_trap_t::new(error)));
        None
    } else {
        Some(Box::new(wb_error_t::from(error)))
    }
}
