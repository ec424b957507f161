//! The path the native engine takes into host closures.
//!
//! Registering a host function stores its closure in a process-wide
//! [`Slab`] and hands the slot index to the native layer as the function's
//! `env` word, together with two entry points:
//!
//! - [`trampoline`], called for every invocation from wasm. It looks the
//!   closure up, converts arguments, runs the closure behind
//!   `catch_unwind`, and writes results back or returns a trap.
//! - [`finalize`], called once when the native function object is
//!   destroyed. Only then is the slot freed, so an index can never be
//!   reused while the native side may still invoke it.
//!
//! A panic inside a closure cannot unwind through native frames. It is
//! stashed on the store and replaced by a trap; the [`Func::call`] or
//! [`Instance::new`](crate::Instance::new) that started the chain re-raises
//! it once the trap reaches the host.

#![allow(unsafe_code)]

use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, trace, warn};
use wasmbridge_common::{Error, FuncType, Trap};
use wasmbridge_sys::{
    wb_caller_t, wb_func_new_with_env, wb_functype_t, wb_trap_new, wb_trap_t, wb_val_t,
};

use crate::handle::Handle;
use crate::native::{error_from_native, functype_to_native};
use crate::slab::Slab;
use crate::store::StoreContextMut;
use crate::store::StoreShared;
use crate::{Caller, Func, Val};

/// Message of the trap that replaces a host panic on its way through wasm.
pub(crate) const PANIC_MESSAGE: &str = "host function panicked";

/// A host closure in its dynamic form.
pub(crate) type HostCallback =
    Box<dyn Fn(Caller<'_>, &[Val]) -> Result<Vec<Val>, Trap> + Send + Sync>;

/// Everything the trampoline needs to run one registered closure.
struct Registration {
    store: Arc<StoreShared>,
    ty: FuncType,
    callback: HostCallback,
}

/// Live registrations, keyed by the `env` word given to the native layer.
///
/// The lock is held only to insert, look up or remove an entry; closures
/// run without it so they may re-enter wasm and reach other host functions.
static REGISTRY: Mutex<Slab<Arc<Registration>>> = parking_lot::const_mutex(Slab::new());

/// Register `callback` with type `ty` and create its native function.
pub(crate) fn register(
    cx: &StoreContextMut<'_>,
    ty: &FuncType,
    callback: HostCallback,
) -> Result<Func, Error> {
    register_as(cx, &functype_to_native(ty), ty, callback)
}

fn register_as(
    cx: &StoreContextMut<'_>,
    native_ty: &wb_functype_t,
    ty: &FuncType,
    callback: HostCallback,
) -> Result<Func, Error> {
    let registration = Arc::new(Registration {
        store: Arc::clone(cx.shared),
        ty: ty.clone(),
        callback,
    });
    let env = REGISTRY.lock().insert(registration);
    trace!(env, ty = %ty, "Registered host function");

    let mut raw = ptr::null_mut();
    // On failure the native layer runs `finalize` before returning.
    let result = unsafe {
        wb_func_new_with_env(cx.raw, native_ty, trampoline, env, Some(finalize), &mut raw)
    };
    if let Some(error) = result {
        return Err(error_from_native(error));
    }
    Ok(Func {
        handle: unsafe { Handle::from_raw(raw, cx.shared) },
    })
}

extern "C" fn trampoline(
    env: usize,
    caller: *mut wb_caller_t<'_>,
    args: *const wb_val_t,
    nargs: usize,
    results: *mut wb_val_t,
    nresults: usize,
) -> *mut wb_trap_t {
    let registration = REGISTRY.lock().get(env).cloned();
    let Some(registration) = registration else {
        error!(env, "Host function invoked without a registration");
        std::process::abort();
    };
    trace!(env, nargs, nresults, "Entering host function");

    let store = &registration.store;
    let args = if nargs == 0 {
        &[][..]
    } else {
        unsafe { std::slice::from_raw_parts(args, nargs) }
    };
    let results = if nresults == 0 {
        &mut [][..]
    } else {
        unsafe { std::slice::from_raw_parts_mut(results, nresults) }
    };
    // Only valid until this function returns; the closure cannot keep it.
    let caller = Caller::new(caller.cast(), store);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), Trap> {
        let params = args
            .iter()
            .map(|arg| unsafe { Val::from_native(arg, store) })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Trap::new("host function received an unsupported value"))?;

        let values = (registration.callback)(caller, &params)?;
        check_results(&registration.ty, &values)?;

        for (slot, val) in results.iter_mut().zip(&values) {
            *slot = val.to_native(store);
        }
        Ok(())
    }));

    match outcome {
        Ok(Ok(())) => ptr::null_mut(),
        Ok(Err(trap)) => new_trap(trap.message()),
        Err(payload) => {
            warn!(env, "Host function panicked, unwinding wasm with a trap");
            store.stash_panic(payload);
            new_trap(PANIC_MESSAGE)
        }
    }
}

extern "C" fn finalize(env: usize) {
    let mut registry = REGISTRY.lock();
    let removed = registry.remove(env);
    let live = registry.len();
    drop(registry);

    if removed.is_none() {
        error!(env, "Host function finalized twice");
        std::process::abort();
    }
    trace!(env, live, "Released host function");
    // The closure and its captures drop here, outside the lock.
    drop(removed);
}

fn new_trap(message: &str) -> *mut wb_trap_t {
    Box::into_raw(unsafe { wb_trap_new(message.as_ptr(), message.len()) })
}

/// Check a closure's results against its declared result types.
fn check_results(ty: &FuncType, values: &[Val]) -> Result<(), Trap> {
    let expected = ty.results();
    if values.len() != expected.len() {
        return Err(Trap::new(format!(
            "host function returned {} results, expected {}",
            values.len(),
            expected.len()
        )));
    }
    for (index, (val, kind)) in values.iter().zip(expected).enumerate() {
        if val.kind() != *kind {
            return Err(Trap::new(format!(
                "host function result {index} has kind {}, expected {kind}",
                val.kind()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AsContextMut, Engine, Store};
    use wasmbridge_common::ValKind;
    use wasmbridge_sys::{WB_I32, wb_functype_new, wb_valkind_t};

    #[test]
    fn test_failed_registration_frees_slot() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let cx = store.as_context_mut();

        let captured = Arc::new(());
        let held = Arc::clone(&captured);
        let callback: HostCallback = Box::new(move |_, _| {
            let _ = &held;
            Ok(Vec::new())
        });

        // No engine value type has this tag, so the native layer rejects it
        // after the closure is already in the registry.
        let bogus: [wb_valkind_t; 2] = [WB_I32, 0xee];
        let native_ty = unsafe { wb_functype_new(bogus.as_ptr(), bogus.len(), ptr::null(), 0) };
        let ty = FuncType::new([ValKind::I32, ValKind::I32], []);

        let err = register_as(&cx, &native_ty, &ty, callback).unwrap_err();
        assert!(matches!(err, Error::Engine { .. }));
        assert_eq!(Arc::strong_count(&captured), 1);

        // The store is unaffected and can still register functions.
        drop(cx);
        let f = Func::wrap(&mut store, |x: i32| x + 1).unwrap();
        assert_eq!(f.call(&mut store, &[Val::I32(1)]).unwrap()[0].i32().unwrap(), 2);
    }

    #[test]
    fn test_check_results_accepts_matching() {
        let ty = FuncType::new([], [ValKind::I32, ValKind::F64]);
        let values = [Val::I32(1), Val::from(2.0f64)];
        assert!(check_results(&ty, &values).is_ok());
    }

    #[test]
    fn test_check_results_count_mismatch() {
        let ty = FuncType::new([], [ValKind::I32]);
        let trap = check_results(&ty, &[]).unwrap_err();
        assert_eq!(trap.message(), "host function returned 0 results, expected 1");
    }

    #[test]
    fn test_check_results_kind_mismatch() {
        let ty = FuncType::new([], [ValKind::I32]);
        let trap = check_results(&ty, &[Val::I64(1)]).unwrap_err();
        assert_eq!(
            trap.message(),
            "host function result 0 has kind i64, expected i32"
        );
    }
}
