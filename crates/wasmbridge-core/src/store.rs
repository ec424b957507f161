//! Stores and store contexts.
//!
//! This module provides:
//! - [`Store`]: the root of one execution context
//! - [`StoreContextMut`]: a borrowed view of a store, either from the store
//!   itself or from the [`Caller`](crate::Caller) of a running host function
//! - [`AsContextMut`]: the trait every store operation is generic over
//!
//! Every native object created under a store is reclaimed through that
//! store's reclamation queue. Obtaining a context is the single point where the
//! queue is drained, so pending deletes never interleave with native use.

#![allow(unsafe_code)]

use std::any::Any;
use std::panic;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};
use wasmbridge_common::{Error, ExecutionConfig};
use wasmbridge_sys::{
    wb_context_get_fuel, wb_context_set_epoch_deadline, wb_context_set_fuel, wb_context_t,
    wb_store_delete, wb_store_new, wb_store_t,
};

use crate::Engine;
use crate::freelist::FreeList;
use crate::handle::NativeHandle;
use crate::native::error_from_native;

/// State shared between a store and every object created under it.
///
/// Wrappers hold an `Arc` to this so they can queue their native handle
/// from whatever thread drops them.
pub(crate) struct StoreShared {
    pub(crate) freelist: FreeList<NativeHandle>,
    panic: Mutex<Option<Box<dyn Any + Send>>>,
    engine: Engine,
}

impl StoreShared {
    /// Remember a panic caught in a host function until the call that
    /// triggered it returns.
    pub(crate) fn stash_panic(&self, payload: Box<dyn Any + Send>) {
        *self.panic.lock() = Some(payload);
    }

    /// Re-raise a stashed panic, if any. Clears the slot.
    pub(crate) fn resume_panic(&self) {
        let payload = self.panic.lock().take();
        if let Some(payload) = payload {
            debug!("Re-raising host function panic");
            panic::resume_unwind(payload);
        }
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Panics unless `self` and `other` are the same store.
    pub(crate) fn assert_same(self: &Arc<Self>, other: &Arc<Self>) {
        assert!(
            Arc::ptr_eq(self, other),
            "object used with a store it does not belong to"
        );
    }
}

/// The root of one execution context.
///
/// A store owns every function, global, memory, table and instance created
/// under it. Objects from one store must never be passed to another; doing
/// so panics.
///
/// Dropping the store deletes the native store. Wrappers that are still
/// alive afterwards stay valid to drop, and their handles are released when
/// the last of them goes away.
pub struct Store {
    raw: NonNull<wb_store_t>,
    shared: Arc<StoreShared>,
}

// A store is only ever used through `&mut`, one thread at a time.
unsafe impl Send for Store {}

impl Store {
    /// Create a new store on `engine`.
    pub fn new(engine: &Engine) -> Self {
        let raw = NonNull::from(Box::leak(wb_store_new(engine.native())));
        debug!("Store created");
        Self {
            raw,
            shared: Arc::new(StoreShared {
                freelist: FreeList::new(),
                panic: Mutex::new(None),
                engine: engine.clone(),
            }),
        }
    }

    /// Create a new store and apply the execution limits in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` asks for fuel or an
    /// epoch deadline the engine was not configured for.
    pub fn with_config(engine: &Engine, config: &ExecutionConfig) -> Result<Self, Error> {
        engine.config().supports(config)?;

        let mut store = Self::new(engine);
        if let Some(fuel) = config.fuel {
            store.set_fuel(fuel)?;
        }
        if let Some(ticks) = config.epoch_deadline {
            store.set_epoch_deadline(ticks);
        }
        Ok(store)
    }

    /// The engine this store was created on.
    pub fn engine(&self) -> &Engine {
        self.shared.engine()
    }

    /// Set the fuel available to wasm running in this store.
    pub fn set_fuel(&mut self, fuel: u64) -> Result<(), Error> {
        self.as_context_mut().set_fuel(fuel)
    }

    /// Fuel left in this store.
    pub fn get_fuel(&mut self) -> Result<u64, Error> {
        self.as_context_mut().get_fuel()
    }

    /// Trap once the engine epoch moves `ticks` past its current value.
    pub fn set_epoch_deadline(&mut self, ticks: u64) {
        self.as_context_mut().set_epoch_deadline(ticks);
    }

    /// Number of native handles waiting to be reclaimed.
    pub fn pending_reclaims(&self) -> usize {
        self.shared.freelist.len()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let reclaimed = self.shared.freelist.drain();
        // Deleting the native store also destroys its host functions, which
        // releases their callback registrations.
        wb_store_delete(unsafe { Box::from_raw(self.raw.as_ptr()) });
        debug!(reclaimed, "Store dropped");
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("pending_reclaims", &self.pending_reclaims())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a store for the duration of one operation.
pub struct StoreContextMut<'a> {
    pub(crate) raw: wb_context_t,
    pub(crate) shared: &'a Arc<StoreShared>,
}

impl<'a> StoreContextMut<'a> {
    /// Build a context, first releasing every handle queued for reclamation.
    pub(crate) fn new(raw: wb_context_t, shared: &'a Arc<StoreShared>) -> Self {
        let reclaimed = shared.freelist.drain();
        if reclaimed > 0 {
            trace!(reclaimed, "Drained reclamation queue");
        }
        Self { raw, shared }
    }

    /// The engine of the underlying store.
    pub fn engine(&self) -> &Engine {
        self.shared.engine()
    }

    /// Set the fuel available to wasm running in this store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the engine does not consume fuel.
    pub fn set_fuel(&mut self, fuel: u64) -> Result<(), Error> {
        match unsafe { wb_context_set_fuel(self.raw, fuel) } {
            Some(error) => Err(error_from_native(error)),
            None => Ok(()),
        }
    }

    /// Fuel left in this store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the engine does not consume fuel.
    pub fn get_fuel(&mut self) -> Result<u64, Error> {
        let mut fuel = 0;
        match unsafe { wb_context_get_fuel(self.raw, &mut fuel) } {
            Some(error) => Err(error_from_native(error)),
            None => Ok(fuel),
        }
    }

    /// Trap once the engine epoch moves `ticks` past its current value.
    pub fn set_epoch_deadline(&mut self, ticks: u64) {
        unsafe { wb_context_set_epoch_deadline(self.raw, ticks) };
    }
}

/// Types that can lend out a [`StoreContextMut`].
///
/// Implemented by [`Store`], [`Caller`](crate::Caller) and
/// [`StoreContextMut`] itself, and by mutable references to any of them, so
/// operations accept `&mut store` and `&mut caller` alike.
pub trait AsContextMut {
    /// Borrow the store for one operation.
    fn as_context_mut(&mut self) -> StoreContextMut<'_>;
}

impl AsContextMut for Store {
    fn as_context_mut(&mut self) -> StoreContextMut<'_> {
        StoreContextMut::new(wb_context_t::Store(self.raw.as_ptr()), &self.shared)
    }
}

impl AsContextMut for StoreContextMut<'_> {
    fn as_context_mut(&mut self) -> StoreContextMut<'_> {
        StoreContextMut::new(self.raw, self.shared)
    }
}

impl<T: AsContextMut + ?Sized> AsContextMut for &mut T {
    fn as_context_mut(&mut self) -> StoreContextMut<'_> {
        T::as_context_mut(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmbridge_common::EngineConfig;

    fn fuel_engine() -> Engine {
        Engine::new(&EngineConfig {
            consume_fuel: true,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_store_creation() {
        let engine = Engine::default();
        let store = Store::new(&engine);

        assert!(Engine::same(store.engine(), &engine));
        assert_eq!(store.pending_reclaims(), 0);
    }

    #[test]
    fn test_store_fuel() {
        let engine = fuel_engine();
        let config = ExecutionConfig {
            fuel: Some(1000),
            ..Default::default()
        };

        let mut store = Store::with_config(&engine, &config).unwrap();
        assert_eq!(store.get_fuel().unwrap(), 1000);

        store.set_fuel(5).unwrap();
        assert_eq!(store.get_fuel().unwrap(), 5);
    }

    #[test]
    fn test_store_fuel_requires_engine_support() {
        let engine = Engine::default();
        let config = ExecutionConfig {
            fuel: Some(1000),
            ..Default::default()
        };

        let err = Store::with_config(&engine, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));

        let mut store = Store::new(&engine);
        assert!(matches!(store.set_fuel(10), Err(Error::Engine { .. })));
    }

    #[test]
    fn test_epoch_deadline_config() {
        let engine = Engine::new(&EngineConfig {
            epoch_interruption: true,
            ..Default::default()
        })
        .unwrap();
        let config = ExecutionConfig {
            epoch_deadline: Some(3),
            ..Default::default()
        };

        assert!(Store::with_config(&engine, &config).is_ok());
    }

    #[test]
    fn test_stashed_panic_is_resumed_once() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let shared = Arc::clone(store.as_context_mut().shared);

        shared.stash_panic(Box::new("boom"));
        let caught = panic::catch_unwind(panic::AssertUnwindSafe(|| shared.resume_panic()))
            .unwrap_err();
        assert_eq!(caught.downcast_ref::<&str>(), Some(&"boom"));

        // The slot was cleared.
        shared.resume_panic();
    }

    #[test]
    #[should_panic(expected = "does not belong to")]
    fn test_store_mismatch_panics() {
        let engine = Engine::default();
        let mut a = Store::new(&engine);
        let mut b = Store::new(&engine);

        let a = Arc::clone(a.as_context_mut().shared);
        let b = Arc::clone(b.as_context_mut().shared);
        a.assert_same(&b);
    }
}
