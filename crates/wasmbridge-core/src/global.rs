//! Global variables.

#![allow(unsafe_code)]

use std::ptr;

use wasmbridge_common::{Error, GlobalType, Mutability};
use wasmbridge_sys::{
    wb_global_get, wb_global_new, wb_global_set, wb_global_t, wb_global_type, wb_val_t,
};

use crate::handle::Handle;
use crate::native::{error_from_native, globaltype_from_native, globaltype_to_native};
use crate::{AsContextMut, Val};

/// A WebAssembly global, owned by a store.
#[derive(Clone)]
pub struct Global {
    pub(crate) handle: Handle<wb_global_t>,
}

impl Global {
    /// Create a global of type `ty` holding `init`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] if `init` does not match `ty.content`.
    pub fn new(mut store: impl AsContextMut, ty: GlobalType, init: Val) -> Result<Self, Error> {
        if init.kind() != ty.content {
            return Err(Error::WrongKind {
                expected: ty.content,
                actual: init.kind(),
            });
        }

        let cx = store.as_context_mut();
        let native_ty = globaltype_to_native(ty);
        let init = init.to_native(cx.shared);
        let mut raw = ptr::null_mut();
        if let Some(error) = unsafe { wb_global_new(cx.raw, &native_ty, &init, &mut raw) } {
            return Err(error_from_native(error));
        }
        Ok(Self {
            handle: unsafe { Handle::from_raw(raw, cx.shared) },
        })
    }

    /// The global's type.
    pub fn ty(&self, mut store: impl AsContextMut) -> GlobalType {
        let cx = store.as_context_mut();
        self.handle.check(&cx);
        globaltype_from_native(unsafe { wb_global_type(cx.raw, self.handle.native()) })
    }

    /// Read the current value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the value cannot be represented on the
    /// host side.
    pub fn get(&self, mut store: impl AsContextMut) -> Result<Val, Error> {
        let cx = store.as_context_mut();
        self.handle.check(&cx);

        let mut raw = wb_val_t::default();
        if let Some(error) = unsafe { wb_global_get(cx.raw, self.handle.native(), &mut raw) } {
            return Err(error_from_native(error));
        }
        unsafe { Val::from_native(&raw, cx.shared) }
            .ok_or_else(|| Error::engine("global holds an unsupported value"))
    }

    /// Write a new value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] for an immutable global and
    /// [`Error::WrongKind`] if `val` has the wrong kind.
    pub fn set(&self, mut store: impl AsContextMut, val: Val) -> Result<(), Error> {
        let cx = store.as_context_mut();
        self.handle.check(&cx);

        let ty = globaltype_from_native(unsafe { wb_global_type(cx.raw, self.handle.native()) });
        if ty.mutability == Mutability::Const {
            return Err(Error::engine("cannot set an immutable global"));
        }
        if val.kind() != ty.content {
            return Err(Error::WrongKind {
                expected: ty.content,
                actual: val.kind(),
            });
        }

        let raw = val.to_native(cx.shared);
        match unsafe { wb_global_set(cx.raw, self.handle.native(), &raw) } {
            Some(error) => Err(error_from_native(error)),
            None => Ok(()),
        }
    }

    /// Release this handle now.
    pub fn close(self, mut store: impl AsContextMut) {
        self.handle.close(&store.as_context_mut());
    }
}

impl std::fmt::Debug for Global {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Global").finish_non_exhaustive()
    }
}
