//! Ownership of store-owned native handles.
//!
//! Every store-owned wrapper ([`Func`](crate::Func), [`Global`](crate::Global),
//! [`Memory`](crate::Memory), [`Table`](crate::Table),
//! [`Instance`](crate::Instance)) is a [`Handle`]: a pointer to the native
//! object plus a shared [`OwnedHandle`] that is responsible for deleting it.
//!
//! A handle is either *owning*, when it points at the allocation its owner
//! deletes, or a *borrowed view*, when it points into an allocation owned by
//! something else (a function viewed out of an instance export). Both kinds
//! share the owner's `Arc`, so a view can never outlive what it points into.

#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::Arc;

use wasmbridge_sys::{
    wb_extern_delete, wb_extern_t, wb_func_delete, wb_func_t, wb_global_delete, wb_global_t,
    wb_instance_delete, wb_instance_t, wb_memory_delete, wb_memory_t, wb_table_delete,
    wb_table_t,
};

use crate::freelist::Reclaim;
use crate::store::{StoreContextMut, StoreShared};

/// A native object awaiting deletion, tagged with the delete to call.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum NativeHandle {
    Func(*mut wb_func_t),
    Global(*mut wb_global_t),
    Memory(*mut wb_memory_t),
    Table(*mut wb_table_t),
    Extern(*mut wb_extern_t),
    Instance(*mut wb_instance_t),
}

// Handles are plain heap pointers; only the deleting thread dereferences them.
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}

impl Reclaim for NativeHandle {
    fn reclaim(self) {
        unsafe {
            match self {
                Self::Func(raw) => wb_func_delete(Box::from_raw(raw)),
                Self::Global(raw) => wb_global_delete(Box::from_raw(raw)),
                Self::Memory(raw) => wb_memory_delete(Box::from_raw(raw)),
                Self::Table(raw) => wb_table_delete(Box::from_raw(raw)),
                Self::Extern(raw) => wb_extern_delete(Box::from_raw(raw)),
                Self::Instance(raw) => wb_instance_delete(Box::from_raw(raw)),
            }
        }
    }
}

/// Native object types that can own a [`Handle`].
pub(crate) trait NativeObject {
    fn tag(raw: *mut Self) -> NativeHandle;
}

macro_rules! native_objects {
    ($($ty:ty => $variant:ident,)*) => {$(
        impl NativeObject for $ty {
            fn tag(raw: *mut Self) -> NativeHandle {
                NativeHandle::$variant(raw)
            }
        }
    )*};
}

native_objects! {
    wb_func_t => Func,
    wb_global_t => Global,
    wb_memory_t => Memory,
    wb_table_t => Table,
    wb_extern_t => Extern,
    wb_instance_t => Instance,
}

/// Sole owner of one native allocation.
///
/// Dropping it queues the allocation on its store's reclamation queue; the
/// delete itself happens at the store's next safe point.
pub(crate) struct OwnedHandle {
    raw: Option<NativeHandle>,
    store: Arc<StoreShared>,
}

impl OwnedHandle {
    pub(crate) fn store(&self) -> &Arc<StoreShared> {
        &self.store
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.store.freelist.enqueue(raw);
        }
    }
}

/// A pointer to a native object of type `T` and the owner keeping it alive.
pub(crate) struct Handle<T> {
    raw: NonNull<T>,
    owner: Arc<OwnedHandle>,
}

// The pointee is only touched through a store context, which requires
// exclusive access to the store.
unsafe impl<T> Send for Handle<T> {}
unsafe impl<T> Sync for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw,
            owner: Arc::clone(&self.owner),
        }
    }
}

impl<T: NativeObject> Handle<T> {
    /// Take ownership of a native allocation belonging to `store`.
    pub(crate) fn owned(raw: Box<T>, store: &Arc<StoreShared>) -> Self {
        let raw = NonNull::from(Box::leak(raw));
        let owner = Arc::new(OwnedHandle {
            raw: Some(T::tag(raw.as_ptr())),
            store: Arc::clone(store),
        });
        Self { raw, owner }
    }

    /// Take ownership of a pointer returned through a native out-parameter.
    ///
    /// # Safety
    ///
    /// `raw` must be non-null, uniquely owned, and allocated by the native
    /// layer.
    pub(crate) unsafe fn from_raw(raw: *mut T, store: &Arc<StoreShared>) -> Self {
        Self::owned(unsafe { Box::from_raw(raw) }, store)
    }
}

impl<T> Handle<T> {
    /// The native object.
    pub(crate) fn native(&self) -> &T {
        unsafe { self.raw.as_ref() }
    }

    /// A borrowed view of `inner`, which must live inside this handle's
    /// allocation.
    pub(crate) fn view<U>(&self, inner: &U) -> Handle<U> {
        Handle {
            raw: NonNull::from(inner),
            owner: Arc::clone(&self.owner),
        }
    }

    /// The store this handle belongs to.
    pub(crate) fn store(&self) -> &Arc<StoreShared> {
        self.owner.store()
    }

    /// Panics unless `cx` is this handle's store.
    pub(crate) fn check(&self, cx: &StoreContextMut<'_>) {
        self.owner.store().assert_same(cx.shared);
    }

    /// Release this reference now instead of waiting for the queue.
    ///
    /// If it was the last reference, the native object is deleted
    /// immediately; otherwise the remaining clones keep it alive.
    pub(crate) fn close(self, cx: &StoreContextMut<'_>) {
        self.check(cx);
        if let Some(mut owner) = Arc::into_inner(self.owner) {
            if let Some(raw) = owner.raw.take() {
                raw.reclaim();
            }
        }
    }

    /// Returns `true` if both handles share the same owner.
    pub(crate) fn same_owner(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.owner, &b.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AsContextMut, Engine, Store};
    use wasmbridge_common::{Mutability, ValKind};
    use wasmbridge_sys::{WB_I32, wb_global_new, wb_val_t, wb_val_union};

    fn native_global(store: &mut Store) -> Handle<wb_global_t> {
        let cx = store.as_context_mut();
        let ty = crate::native::globaltype_to_native(wasmbridge_common::GlobalType::new(
            ValKind::I32,
            Mutability::Var,
        ));
        let init = wb_val_t {
            kind: WB_I32,
            of: wb_val_union { i32: 1 },
        };
        let mut raw = std::ptr::null_mut();
        let err = unsafe { wb_global_new(cx.raw, &ty, &init, &mut raw) };
        assert!(err.is_none());
        unsafe { Handle::from_raw(raw, cx.shared) }
    }

    #[test]
    fn test_drop_enqueues_until_next_use() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let handle = native_global(&mut store);
        let clone = handle.clone();
        drop(handle);
        assert_eq!(store.pending_reclaims(), 0);

        drop(clone);
        assert_eq!(store.pending_reclaims(), 1);

        store.as_context_mut();
        assert_eq!(store.pending_reclaims(), 0);
    }

    #[test]
    fn test_close_deletes_immediately() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let handle = native_global(&mut store);
        handle.close(&store.as_context_mut());
        assert_eq!(store.pending_reclaims(), 0);
    }

    #[test]
    fn test_view_shares_owner() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let handle = native_global(&mut store);
        let view = handle.view(handle.native());
        assert!(Handle::same_owner(&handle, &view));

        drop(handle);
        assert_eq!(store.pending_reclaims(), 0);
        drop(view);
        assert_eq!(store.pending_reclaims(), 1);
    }

    #[test]
    fn test_handle_outlives_store() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let handle = native_global(&mut store);

        drop(store);
        // Reclaimed when the last reference to the store state goes away.
        drop(handle);
    }
}
