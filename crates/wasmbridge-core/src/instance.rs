//! Module instantiation.
//!
//! [`Instance::new`] takes imports positionally, in the order
//! [`Module::imports`] reports them. For name-based resolution use a
//! [`Linker`](crate::Linker).

#![allow(unsafe_code)]

use std::ptr;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use wasmbridge_common::Error;
use wasmbridge_sys::{
    wb_byte_vec_t, wb_extern_t, wb_instance_export_get, wb_instance_export_nth, wb_instance_new,
    wb_instance_t,
};

use crate::handle::Handle;
use crate::native::{error_from_native, trap_from_native};
use crate::{AsContextMut, Engine, Extern, Func, Module};

/// An instantiated module, owned by a store.
#[derive(Clone)]
pub struct Instance {
    handle: Handle<wb_instance_t>,
}

impl Instance {
    /// Instantiate `module` with `imports`, running its start function.
    ///
    /// # Errors
    ///
    /// - [`Error::ImportCount`] if `imports` does not match the module
    /// - [`Error::Engine`] if the module belongs to another engine or an
    ///   import has the wrong type
    /// - [`Error::Trap`] if the start function traps
    ///
    /// # Panics
    ///
    /// Panics if an import belongs to another store, and resumes the panic
    /// of a host function that panicked during the start function.
    #[instrument(skip_all, fields(imports = imports.len()))]
    pub fn new(
        mut store: impl AsContextMut,
        module: &Module,
        imports: &[Extern],
    ) -> Result<Self, Error> {
        let start = Instant::now();
        let cx = store.as_context_mut();

        if !Engine::same(cx.engine(), module.engine()) {
            return Err(Error::engine(
                "module was compiled for a different engine than the store's",
            ));
        }
        let expected = module.import_count();
        if imports.len() != expected {
            return Err(Error::ImportCount {
                expected,
                actual: imports.len(),
            });
        }
        for import in imports {
            import.store().assert_same(cx.shared);
        }

        let raw_imports: Vec<*const wb_extern_t> = imports
            .iter()
            .map(|import| ptr::from_ref(import.as_native()))
            .collect();
        let mut raw = ptr::null_mut();
        let mut trap = ptr::null_mut();
        let error = unsafe {
            wb_instance_new(
                cx.raw,
                module.native(),
                raw_imports.as_ptr(),
                raw_imports.len(),
                &mut raw,
                &mut trap,
            )
        };

        if let Some(error) = error {
            return Err(error_from_native(error));
        }
        if !trap.is_null() {
            let trap = unsafe { trap_from_native(trap) };
            cx.shared.resume_panic();
            warn!(message = trap.message(), "Start function trapped");
            return Err(Error::Trap(trap));
        }

        info!(
            content_hash = %module.content_hash(),
            duration_us = start.elapsed().as_micros(),
            "Module instantiated"
        );
        Ok(Self {
            handle: unsafe { Handle::from_raw(raw, cx.shared) },
        })
    }

    /// Look up an export by name.
    pub fn get_export(&self, mut store: impl AsContextMut, name: &str) -> Option<Extern> {
        let cx = store.as_context_mut();
        self.handle.check(&cx);

        let mut raw = ptr::null_mut();
        let found = unsafe {
            wb_instance_export_get(
                cx.raw,
                self.handle.native(),
                name.as_ptr(),
                name.len(),
                &mut raw,
            )
        };
        if !found {
            debug!(name, "Export not found");
            return None;
        }
        Extern::from_native(unsafe { Handle::from_raw(raw, cx.shared) })
    }

    /// Look up an exported function by name.
    pub fn get_func(&self, store: impl AsContextMut, name: &str) -> Option<Func> {
        self.get_export(store, name).and_then(Extern::into_func)
    }

    /// All exports, in module order.
    pub fn exports(&self, mut store: impl AsContextMut) -> Vec<(String, Extern)> {
        let cx = store.as_context_mut();
        self.handle.check(&cx);

        let mut exports = Vec::new();
        for index in 0.. {
            let mut name = wb_byte_vec_t::empty();
            let mut raw = ptr::null_mut();
            let found = unsafe {
                wb_instance_export_nth(cx.raw, self.handle.native(), index, &mut name, &mut raw)
            };
            if !found {
                break;
            }
            let item = unsafe { Handle::from_raw(raw, cx.shared) };
            if let Some(item) = Extern::from_native(item) {
                exports.push((String::from_utf8_lossy(name.as_slice()).into_owned(), item));
            }
        }
        exports
    }

    /// Release this handle now.
    ///
    /// Exports already taken out of the instance stay usable.
    pub fn close(self, mut store: impl AsContextMut) {
        self.handle.close(&store.as_context_mut());
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Store, Val};

    const COUNTER_WAT: &str = r#"
        (module
            (global $count (export "count") (mut i32) (i32.const 0))
            (memory (export "memory") 1)
            (func (export "bump") (result i32)
                global.get $count
                i32.const 1
                i32.add
                global.set $count
                global.get $count))
    "#;

    #[test]
    fn test_instance_exports() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(&engine, COUNTER_WAT).unwrap();
        let instance = Instance::new(&mut store, &module, &[]).unwrap();

        let names: Vec<_> = instance
            .exports(&mut store)
            .into_iter()
            .map(|(name, ext)| (name, ext.kind_name()))
            .collect();
        assert_eq!(
            names,
            [
                ("count".to_string(), "global"),
                ("memory".to_string(), "memory"),
                ("bump".to_string(), "func"),
            ]
        );
        assert!(instance.get_export(&mut store, "missing").is_none());
        assert!(instance.get_func(&mut store, "memory").is_none());
    }

    #[test]
    fn test_instance_state_is_shared() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(&engine, COUNTER_WAT).unwrap();
        let instance = Instance::new(&mut store, &module, &[]).unwrap();

        let bump = instance.get_func(&mut store, "bump").unwrap();
        bump.call(&mut store, &[]).unwrap();
        bump.call(&mut store, &[]).unwrap();

        let count = instance
            .get_export(&mut store, "count")
            .and_then(Extern::into_global)
            .unwrap();
        assert_eq!(count.get(&mut store).unwrap().i32().unwrap(), 2);
    }

    #[test]
    fn test_import_count_checked() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(
            &engine,
            r#"(module (import "env" "f" (func)) (import "env" "g" (func)))"#,
        )
        .unwrap();
        let f = Func::wrap(&mut store, || {}).unwrap();

        let err = Instance::new(&mut store, &module, &[f.into()]).unwrap_err();
        assert!(matches!(
            err,
            Error::ImportCount {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_import_type_mismatch() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(&engine, r#"(module (import "env" "f" (func (param i32))))"#)
            .unwrap();
        let f = Func::wrap(&mut store, |_: i64| {}).unwrap();

        let err = Instance::new(&mut store, &module, &[f.into()]).unwrap_err();
        assert!(matches!(err, Error::Engine { .. }));
    }

    #[test]
    fn test_module_from_other_engine() {
        let engine = Engine::default();
        let other = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(&other, "(module)").unwrap();

        let err = Instance::new(&mut store, &module, &[]).unwrap_err();
        assert!(matches!(err, Error::Engine { .. }));
    }

    #[test]
    fn test_start_trap() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(&engine, "(module (func $s unreachable) (start $s))").unwrap();

        let err = Instance::new(&mut store, &module, &[]).unwrap_err();
        assert!(err.is_trap());
    }

    #[test]
    fn test_exports_outlive_closed_instance() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(&engine, COUNTER_WAT).unwrap();
        let instance = Instance::new(&mut store, &module, &[]).unwrap();

        let bump = instance.get_func(&mut store, "bump").unwrap();
        instance.close(&mut store);

        let results = bump.call(&mut store, &[]).unwrap();
        assert_eq!(results[0].i32().unwrap(), 1);
        assert!(matches!(results[0], Val::I32(1)));
    }
}
