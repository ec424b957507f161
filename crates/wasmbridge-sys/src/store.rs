use wasmtime::{AsContextMut, Caller, Store, StoreContextMut};

use crate::{handle_result, wb_engine_t, wb_error_t};

/// Root of one execution context.
pub struct wb_store_t {
    pub(crate) store: Store<()>,
}

/// The caller of a host function; only valid while that function runs.
pub struct wb_caller_t<'a> {
    pub(crate) caller: Caller<'a, ()>,
}

/// Where a store operation runs: on the store itself, or through the
/// caller of a host function currently executing on that store.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub enum wb_context_t {
    Store(*mut wb_store_t),
    Caller(*mut wb_caller_t<'static>),
}

impl wb_context_t {
    /// Run `f` against the context's store.
    ///
    /// # Safety
    ///
    /// The pointer held by `self` must be live and not aliased for the
    /// duration of the call.
    pub(crate) unsafe fn with<R>(self, f: impl FnOnce(StoreContextMut<'_, ()>) -> R) -> R {
        match self {
            Self::Store(store) => f(unsafe { &mut *store }.store.as_context_mut()),
            Self::Caller(caller) => f(unsafe { &mut *caller }.caller.as_context_mut()),
        }
    }
}

pub extern "C" fn wb_store_new(engine: &wb_engine_t) -> Box<wb_store_t> {
    Box::new(wb_store_t {
        store: Store::new(&engine.engine, ()),
    })
}

pub extern "C" fn wb_store_delete(_store: Box<wb_store_t>) {}

pub unsafe extern "C" fn wb_context_set_fuel(cx: wb_context_t, fuel: u64) -> Option<Box<wb_error_t>> {
    let result = unsafe { cx.with(|mut store| store.set_fuel(fuel)) };
    handle_result(result, |()| {})
}

pub unsafe extern "C" fn wb_context_get_fuel(
    cx: wb_context_t,
    fuel: &mut u64,
) -> Option<Box<wb_error_t>> {
    let result = unsafe { cx.with(|store| store.get_fuel()) };
    handle_result(result, |remaining| *fuel = remaining)
}

pub unsafe extern "C" fn wb_context_set_epoch_deadline(cx: wb_context_t, ticks_beyond_current: u64) {
    unsafe { cx.with(|mut store| store.set_epoch_deadline(ticks_beyond_current)) }
}
