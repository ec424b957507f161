//! Tables of references.

#![allow(unsafe_code)]

use std::ptr;

use tracing::debug;
use wasmbridge_common::{Error, TableType};
use wasmbridge_sys::{
    wb_table_get, wb_table_grow, wb_table_new, wb_table_set, wb_table_size, wb_table_t,
    wb_table_type, wb_val_t,
};

use crate::handle::Handle;
use crate::native::{error_from_native, tabletype_from_native, tabletype_to_native};
use crate::{AsContextMut, Val};

/// A WebAssembly table, owned by a store.
#[derive(Clone)]
pub struct Table {
    pub(crate) handle: Handle<wb_table_t>,
}

impl Table {
    /// Create a table of type `ty` with every element set to `init`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] if `init` is not of the table's element
    /// kind, and [`Error::Engine`] if the engine rejects the table.
    pub fn new(mut store: impl AsContextMut, ty: TableType, init: Val) -> Result<Self, Error> {
        if init.kind() != ty.element {
            return Err(Error::WrongKind {
                expected: ty.element,
                actual: init.kind(),
            });
        }

        let cx = store.as_context_mut();
        let native_ty = tabletype_to_native(ty);
        let init = init.to_native(cx.shared);
        let mut raw = ptr::null_mut();
        if let Some(error) = unsafe { wb_table_new(cx.raw, &native_ty, &init, &mut raw) } {
            return Err(error_from_native(error));
        }
        Ok(Self {
            handle: unsafe { Handle::from_raw(raw, cx.shared) },
        })
    }

    /// The table's type.
    pub fn ty(&self, mut store: impl AsContextMut) -> TableType {
        let cx = store.as_context_mut();
        self.handle.check(&cx);
        tabletype_from_native(unsafe { wb_table_type(cx.raw, self.handle.native()) })
    }

    /// Current size in elements.
    pub fn size(&self, mut store: impl AsContextMut) -> u64 {
        let cx = store.as_context_mut();
        self.handle.check(&cx);
        unsafe { wb_table_size(cx.raw, self.handle.native()) }
    }

    /// Read the element at `index`, or `None` if it is out of bounds.
    pub fn get(&self, mut store: impl AsContextMut, index: u64) -> Option<Val> {
        let cx = store.as_context_mut();
        self.handle.check(&cx);

        let mut raw = wb_val_t::default();
        if !unsafe { wb_table_get(cx.raw, self.handle.native(), index, &mut raw) } {
            return None;
        }
        unsafe { Val::from_native(&raw, cx.shared) }
    }

    /// Write the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] for a value of the wrong kind and
    /// [`Error::Engine`] if `index` is out of bounds.
    pub fn set(&self, mut store: impl AsContextMut, index: u64, val: Val) -> Result<(), Error> {
        let cx = store.as_context_mut();
        self.handle.check(&cx);
        self.check_element(&cx, &val)?;

        let raw = val.to_native(cx.shared);
        match unsafe { wb_table_set(cx.raw, self.handle.native(), index, &raw) } {
            Some(error) => Err(error_from_native(error)),
            None => Ok(()),
        }
    }

    /// Grow by `delta` elements, filling new slots with `init`, and return
    /// the previous size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] for an `init` of the wrong kind and
    /// [`Error::Engine`] if the table would exceed its maximum.
    pub fn grow(&self, mut store: impl AsContextMut, delta: u64, init: Val) -> Result<u64, Error> {
        let cx = store.as_context_mut();
        self.handle.check(&cx);
        self.check_element(&cx, &init)?;

        let init = init.to_native(cx.shared);
        let mut prev = 0;
        let result =
            unsafe { wb_table_grow(cx.raw, self.handle.native(), delta, &init, &mut prev) };
        if let Some(error) = result {
            return Err(error_from_native(error));
        }
        debug!(prev, delta, "Table grown");
        Ok(prev)
    }

    /// Release this handle now.
    pub fn close(self, mut store: impl AsContextMut) {
        self.handle.close(&store.as_context_mut());
    }

    fn check_element(&self, cx: &crate::StoreContextMut<'_>, val: &Val) -> Result<(), Error> {
        let ty = tabletype_from_native(unsafe { wb_table_type(cx.raw, self.handle.native()) });
        if val.kind() == ty.element {
            Ok(())
        } else {
            Err(Error::WrongKind {
                expected: ty.element,
                actual: val.kind(),
            })
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, ExternRef, Func, Store};
    use wasmbridge_common::ValKind;

    #[test]
    fn test_table_grow_returns_previous_size() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let ty = TableType::new(ValKind::ExternRef, 2, Some(10));
        let table = Table::new(&mut store, ty, Val::ExternRef(None)).unwrap();
        assert_eq!(table.size(&mut store), 2);

        let marker = ExternRef::new("fill");
        let prev = table.grow(&mut store, 3, Val::from(marker.clone())).unwrap();
        assert_eq!(prev, 2);
        assert_eq!(table.size(&mut store), 5);

        assert!(table.get(&mut store, 1).unwrap().externref().unwrap().is_none());
        for index in 2..5 {
            let val = table.get(&mut store, index).unwrap();
            assert!(ExternRef::ptr_eq(val.externref().unwrap().unwrap(), &marker));
        }
        assert!(table.get(&mut store, 5).is_none());
    }

    #[test]
    fn test_table_grow_past_max() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let ty = TableType::new(ValKind::FuncRef, 1, Some(1));
        let table = Table::new(&mut store, ty, Val::FuncRef(None)).unwrap();
        assert!(table.grow(&mut store, 1, Val::FuncRef(None)).is_err());
        assert_eq!(table.size(&mut store), 1);
    }

    #[test]
    fn test_table_set_funcref() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let ty = TableType::new(ValKind::FuncRef, 1, None);
        let table = Table::new(&mut store, ty, Val::FuncRef(None)).unwrap();
        let func = Func::wrap(&mut store, || 3i32).unwrap();

        table.set(&mut store, 0, Val::from(func)).unwrap();
        let stored = table.get(&mut store, 0).unwrap();
        let stored = stored.funcref().unwrap().unwrap().clone();
        let results = stored.call(&mut store, &[]).unwrap();
        assert_eq!(results[0].i32().unwrap(), 3);

        assert!(table.set(&mut store, 4, Val::FuncRef(None)).is_err());
        let err = table.set(&mut store, 0, Val::I32(1)).unwrap_err();
        assert!(matches!(err, Error::WrongKind { .. }));
    }
}
