use std::{mem, ptr, str};

use crate::slice_from_raw_parts;

/// An owned byte buffer returned to the host.
///
/// The buffer is released when the value is dropped.
#[repr(C)]
pub struct wb_byte_vec_t {
    pub size: usize,
    pub data: *mut u8,
}

impl wb_byte_vec_t {
    pub const fn empty() -> Self {
        Self {
            size: 0,
            data: ptr::null_mut(),
        }
    }

    pub(crate) fn set_buffer(&mut self, buffer: Vec<u8>) {
        drop(self.take());
        let mut buffer = buffer.into_boxed_slice();
        self.size = buffer.len();
        self.data = buffer.as_mut_ptr();
        mem::forget(buffer);
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice_from_raw_parts(self.data, self.size) }
    }

    /// Take ownership of the buffer, leaving this vector empty.
    pub fn take(&mut self) -> Vec<u8> {
        if self.data.is_null() {
            return Vec::new();
        }
        let buffer = unsafe { Vec::from_raw_parts(self.data, self.size, self.size) };
        self.size = 0;
        self.data = ptr::null_mut();
        buffer
    }
}

impl Default for wb_byte_vec_t {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for wb_byte_vec_t {
    fn drop(&mut self) {
        drop(self.take());
    }
}

/// A borrowed UTF-8 name, valid as long as the object it came from.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct wb_name_t {
    pub size: usize,
    pub data: *const u8,
}

impl wb_name_t {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            size: name.len(),
            data: name.as_ptr(),
        }
    }

    pub(crate) const fn none() -> Self {
        Self {
            size: 0,
            data: ptr::null(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.data.is_null()
    }

    /// # Safety
    ///
    /// The object this name was borrowed from must still be alive for `'a`.
    pub unsafe fn as_str<'a>(&self) -> &'a str {
        let bytes = unsafe { slice_from_raw_parts(self.data, self.size) };
        str::from_utf8(bytes).unwrap_or_default()
    }
}
