//! Linear memories.

#![allow(unsafe_code)]

use std::ptr;

use tracing::debug;
use wasmbridge_common::{Error, MemoryType};
use wasmbridge_sys::{
    wb_memory_data, wb_memory_data_size, wb_memory_grow, wb_memory_new, wb_memory_size,
    wb_memory_t, wb_memory_type,
};

use crate::handle::Handle;
use crate::native::{error_from_native, memorytype_from_native, memorytype_to_native};
use crate::{AsContextMut, StoreContextMut};

/// Size of one wasm page in bytes.
pub const PAGE_SIZE: usize = 0x1_0000;

/// A WebAssembly linear memory, owned by a store.
///
/// The host never holds a pointer into the memory across operations: every
/// access goes through a store context, and growing the memory may move it.
#[derive(Clone)]
pub struct Memory {
    pub(crate) handle: Handle<wb_memory_t>,
}

impl Memory {
    /// Create a memory of type `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the limits are invalid or the engine
    /// does not support the requested memory.
    pub fn new(mut store: impl AsContextMut, ty: MemoryType) -> Result<Self, Error> {
        let cx = store.as_context_mut();
        let native_ty = memorytype_to_native(ty);
        let mut raw = ptr::null_mut();
        if let Some(error) = unsafe { wb_memory_new(cx.raw, &native_ty, &mut raw) } {
            return Err(error_from_native(error));
        }
        Ok(Self {
            handle: unsafe { Handle::from_raw(raw, cx.shared) },
        })
    }

    /// The memory's type.
    pub fn ty(&self, mut store: impl AsContextMut) -> MemoryType {
        let cx = store.as_context_mut();
        self.handle.check(&cx);
        memorytype_from_native(unsafe { wb_memory_type(cx.raw, self.handle.native()) })
    }

    /// Current size in pages.
    pub fn size(&self, mut store: impl AsContextMut) -> u64 {
        let cx = store.as_context_mut();
        self.handle.check(&cx);
        unsafe { wb_memory_size(cx.raw, self.handle.native()) }
    }

    /// Current size in bytes.
    pub fn data_size(&self, mut store: impl AsContextMut) -> usize {
        let cx = store.as_context_mut();
        self.handle.check(&cx);
        unsafe { wb_memory_data_size(cx.raw, self.handle.native()) }
    }

    /// Grow by `delta` pages and return the previous size in pages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the memory would exceed its maximum.
    pub fn grow(&self, mut store: impl AsContextMut, delta: u64) -> Result<u64, Error> {
        let cx = store.as_context_mut();
        self.handle.check(&cx);

        let mut prev = 0;
        let result = unsafe { wb_memory_grow(cx.raw, self.handle.native(), delta, &mut prev) };
        if let Some(error) = result {
            return Err(error_from_native(error));
        }
        debug!(prev, delta, "Memory grown");
        Ok(prev)
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MemoryAccess`] if the range is out of bounds.
    pub fn read(
        &self,
        mut store: impl AsContextMut,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        let mut cx = store.as_context_mut();
        self.with_data_in(&mut cx, |data| {
            let src = checked_range(data, offset, buf.len())?;
            buf.copy_from_slice(src);
            Ok(())
        })
    }

    /// Copy `buf` into the memory starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MemoryAccess`] if the range is out of bounds.
    pub fn write(
        &self,
        mut store: impl AsContextMut,
        offset: usize,
        buf: &[u8],
    ) -> Result<(), Error> {
        let mut cx = store.as_context_mut();
        self.with_data_in(&mut cx, |data| {
            let size = data.len();
            let dst = offset
                .checked_add(buf.len())
                .and_then(|end| data.get_mut(offset..end))
                .ok_or(Error::MemoryAccess {
                    offset,
                    len: buf.len(),
                    size,
                })?;
            dst.copy_from_slice(buf);
            Ok(())
        })
    }

    /// Run `f` with the memory's contents.
    ///
    /// The slice is valid only inside `f`; the store stays borrowed for the
    /// whole call so nothing can grow the memory underneath it.
    pub fn with_data<R>(
        &self,
        mut store: impl AsContextMut,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> R {
        let mut cx = store.as_context_mut();
        self.with_data_in(&mut cx, f)
    }

    fn with_data_in<R>(
        &self,
        cx: &mut StoreContextMut<'_>,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> R {
        self.handle.check(cx);
        let (base, len) = unsafe {
            (
                wb_memory_data(cx.raw, self.handle.native()),
                wb_memory_data_size(cx.raw, self.handle.native()),
            )
        };
        if len == 0 {
            return f(&mut []);
        }
        f(unsafe { std::slice::from_raw_parts_mut(base, len) })
    }

    /// Release this handle now.
    pub fn close(self, mut store: impl AsContextMut) {
        self.handle.close(&store.as_context_mut());
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory").finish_non_exhaustive()
    }
}

fn checked_range(data: &[u8], offset: usize, len: usize) -> Result<&[u8], Error> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(Error::MemoryAccess {
            offset,
            len,
            size: data.len(),
        })
}
