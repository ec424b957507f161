//! Functions and host-function callers.

#![allow(unsafe_code)]

use std::ptr;
use std::sync::Arc;

use tracing::{debug, instrument};
use wasmbridge_common::{Error, FuncType, Trap};
use wasmbridge_sys::{
    wb_caller_export_get, wb_caller_t, wb_context_t, wb_func_call, wb_func_t, wb_func_type,
    wb_val_t,
};

use crate::handle::Handle;
use crate::native::{error_from_native, functype_from_native, trap_from_native};
use crate::store::StoreShared;
use crate::trampoline::{self, HostCallback};
use crate::typed::IntoFunc;
use crate::{AsContextMut, Engine, Extern, StoreContextMut, Val};

/// A WebAssembly function, exported by an instance or defined by the host.
///
/// Cloning is cheap and every clone refers to the same function.
#[derive(Clone)]
pub struct Func {
    pub(crate) handle: Handle<wb_func_t>,
}

impl Func {
    /// Define a host function with an explicit type.
    ///
    /// The closure receives the arguments as [`Val`]s and must return one
    /// value per declared result, of the declared kind. Returning anything
    /// else traps the calling wasm; it never corrupts the call. Returning
    /// `Err(trap)` traps with that message.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let ty = FuncType::new([ValKind::I32], [ValKind::I32]);
    /// let double = Func::new(&mut store, ty, |_caller, args| {
    ///     let x = args[0].i32().map_err(|e| Trap::new(e.to_string()))?;
    ///     Ok(vec![Val::I32(x * 2)])
    /// })?;
    /// ```
    pub fn new<F>(mut store: impl AsContextMut, ty: FuncType, func: F) -> Result<Self, Error>
    where
        F: Fn(Caller<'_>, &[Val]) -> Result<Vec<Val>, Trap> + Send + Sync + 'static,
    {
        let cx = store.as_context_mut();
        trampoline::register(&cx, &ty, Box::new(func))
    }

    /// Define a host function whose type is taken from the closure's
    /// signature.
    ///
    /// Parameters may be `i32`, `i64`, `f32`, `f64`, `Option<Func>` or
    /// `Option<ExternRef>`, optionally preceded by a [`Caller`]. The return
    /// type may be `()`, one such value, a tuple of them, or a
    /// `Result<_, Trap>` of any of those.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let add = Func::wrap(&mut store, |a: i32, b: i32| a + b)?;
    /// ```
    pub fn wrap<Params, Results>(
        mut store: impl AsContextMut,
        func: impl IntoFunc<Params, Results>,
    ) -> Result<Self, Error> {
        let (ty, callback): (FuncType, HostCallback) = func.into_host_func();
        let cx = store.as_context_mut();
        trampoline::register(&cx, &ty, callback)
    }

    /// The function's type.
    pub fn ty(&self, mut store: impl AsContextMut) -> FuncType {
        let cx = store.as_context_mut();
        self.handle.check(&cx);
        let ty = unsafe { wb_func_type(cx.raw, self.handle.native()) };
        functype_from_native(&ty)
    }

    /// Call the function.
    ///
    /// Arguments are checked against the function's type before anything
    /// runs. A trap raised by wasm or by a host function is returned as
    /// [`Error::Trap`].
    ///
    /// # Panics
    ///
    /// If a host function panicked somewhere below this call, the panic is
    /// resumed here with its original payload. Also panics if the function
    /// or a function reference argument belongs to another store.
    #[instrument(level = "debug", skip_all, fields(args = params.len()))]
    pub fn call(&self, mut store: impl AsContextMut, params: &[Val]) -> Result<Vec<Val>, Error> {
        let cx = store.as_context_mut();
        self.handle.check(&cx);

        let ty = self.ty_in(&cx);
        check_params(&ty, params)?;

        let args: Vec<wb_val_t> = params.iter().map(|p| p.to_native(cx.shared)).collect();
        let mut results: Vec<wb_val_t> = ty.results().iter().map(|_| wb_val_t::default()).collect();
        let mut trap = ptr::null_mut();
        let error = unsafe {
            wb_func_call(
                cx.raw,
                self.handle.native(),
                args.as_ptr(),
                args.len(),
                results.as_mut_ptr(),
                results.len(),
                &mut trap,
            )
        };

        if let Some(error) = error {
            return Err(error_from_native(error));
        }
        if !trap.is_null() {
            let trap = unsafe { trap_from_native(trap) };
            cx.shared.resume_panic();
            debug!(message = trap.message(), "Call trapped");
            return Err(Error::Trap(trap));
        }

        results
            .iter()
            .map(|raw| unsafe { Val::from_native(raw, cx.shared) })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::engine("function returned an unsupported value"))
    }

    /// Release this function handle now.
    ///
    /// A host function stays callable from wasm that already imported it;
    /// only this handle goes away.
    pub fn close(self, mut store: impl AsContextMut) {
        self.handle.close(&store.as_context_mut());
    }

    fn ty_in(&self, cx: &StoreContextMut<'_>) -> FuncType {
        let ty = unsafe { wb_func_type(cx.raw, self.handle.native()) };
        functype_from_native(&ty)
    }
}

impl std::fmt::Debug for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Func").finish_non_exhaustive()
    }
}

fn check_params(ty: &FuncType, params: &[Val]) -> Result<(), Error> {
    if params.len() != ty.params().len() {
        return Err(Error::ArgumentCount {
            expected: ty.params().len(),
            actual: params.len(),
        });
    }
    for (index, (param, kind)) in params.iter().zip(ty.params()).enumerate() {
        if param.kind() != *kind {
            return Err(Error::ArgumentType {
                index,
                expected: *kind,
                actual: param.kind(),
            });
        }
    }
    Ok(())
}

/// The context of a host function invocation.
///
/// A `Caller` gives the host function access to the store it runs in and
/// to the exports of the instance that called it. It only exists while the
/// host function runs.
pub struct Caller<'a> {
    raw: *mut wb_caller_t<'static>,
    shared: &'a Arc<StoreShared>,
}

impl<'a> Caller<'a> {
    pub(crate) fn new(raw: *mut wb_caller_t<'static>, shared: &'a Arc<StoreShared>) -> Self {
        Self { raw, shared }
    }

    /// Look up an export of the calling instance.
    pub fn get_export(&mut self, name: &str) -> Option<Extern> {
        self.as_context_mut();
        let mut raw = ptr::null_mut();
        let found = unsafe { wb_caller_export_get(self.raw, name.as_ptr(), name.len(), &mut raw) };
        if !found {
            return None;
        }
        Extern::from_native(unsafe { Handle::from_raw(raw, self.shared) })
    }

    /// The engine of the store this function runs in.
    pub fn engine(&self) -> &Engine {
        self.shared.engine()
    }
}

impl AsContextMut for Caller<'_> {
    fn as_context_mut(&mut self) -> StoreContextMut<'_> {
        StoreContextMut::new(wb_context_t::Caller(self.raw), self.shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use wasmbridge_common::ValKind;

    #[test]
    fn test_host_func_type() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let ty = FuncType::new([ValKind::I32, ValKind::F32], [ValKind::I64]);
        let func = Func::new(&mut store, ty.clone(), |_, _| Ok(vec![Val::I64(0)])).unwrap();

        assert_eq!(func.ty(&mut store), ty);
    }

    #[test]
    fn test_call_host_func_directly() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let ty = FuncType::new([ValKind::I32], [ValKind::I32]);
        let func = Func::new(&mut store, ty, |_, args| {
            let x = args[0].i32().map_err(|e| Trap::new(e.to_string()))?;
            Ok(vec![Val::I32(x + 1)])
        })
        .unwrap();

        let results = func.call(&mut store, &[Val::I32(41)]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].i32().unwrap(), 42);
    }

    #[test]
    fn test_call_checks_arguments() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let ty = FuncType::new([ValKind::I32], []);
        let func = Func::new(&mut store, ty, |_, _| Ok(Vec::new())).unwrap();

        let err = func.call(&mut store, &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::ArgumentCount {
                expected: 1,
                actual: 0
            }
        ));

        let err = func.call(&mut store, &[Val::F64(0)]).unwrap_err();
        assert!(matches!(
            err,
            Error::ArgumentType {
                index: 0,
                expected: ValKind::I32,
                actual: ValKind::F64,
            }
        ));
    }

    #[test]
    fn test_wrong_result_is_trap() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let ty = FuncType::new([], [ValKind::I32]);
        let func = Func::new(&mut store, ty, |_, _| Ok(vec![Val::F32(0)])).unwrap();

        let err = func.call(&mut store, &[]).unwrap_err();
        let trap = err.as_trap().unwrap();
        assert!(trap.message().contains("expected i32"));
        assert_eq!(trap.code(), None);
    }

    #[test]
    fn test_close_keeps_clones_usable() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let func = Func::wrap(&mut store, || 7i32).unwrap();
        let clone = func.clone();
        func.close(&mut store);

        let results = clone.call(&mut store, &[]).unwrap();
        assert_eq!(results[0].i32().unwrap(), 7);
    }

    #[test]
    #[should_panic(expected = "does not belong to")]
    fn test_call_with_other_store_panics() {
        let engine = Engine::default();
        let mut a = Store::new(&engine);
        let mut b = Store::new(&engine);

        let func = Func::wrap(&mut a, || {}).unwrap();
        let _ = func.call(&mut b, &[]);
    }
}
