//! Runtime values and their native representation.
//!
//! [`Val`] is the host-side value type. Conversion to and from the native
//! tagged union is total for the numeric kinds; references are carried as
//! handles. An [`ExternRef`] wraps any host object and comes back out of
//! wasm as the very same object.

#![allow(unsafe_code)]

use std::any::Any;
use std::fmt;
use std::ptr;
use std::sync::Arc;

use wasmbridge_common::{Error, ValKind};
use wasmbridge_sys::{
    WB_EXTERNREF, WB_F32, WB_F64, WB_FUNCREF, WB_I32, WB_I64, wb_externref_data,
    wb_externref_new, wb_func_copy, wb_val_t, wb_val_union,
};

use crate::Func;
use crate::handle::Handle;
use crate::store::StoreShared;

/// A WebAssembly value.
///
/// Floats are stored as their raw IEEE bits so that NaN payloads survive a
/// trip through wasm unchanged.
#[derive(Clone, Debug)]
pub enum Val {
    /// A 32-bit integer.
    I32(i32),
    /// A 64-bit integer.
    I64(i64),
    /// Bits of a 32-bit float.
    F32(u32),
    /// Bits of a 64-bit float.
    F64(u64),
    /// A function reference, `None` for `ref.null func`.
    FuncRef(Option<Func>),
    /// A host reference, `None` for `ref.null extern`.
    ExternRef(Option<ExternRef>),
}

impl Val {
    /// The kind of this value.
    pub fn kind(&self) -> ValKind {
        match self {
            Self::I32(_) => ValKind::I32,
            Self::I64(_) => ValKind::I64,
            Self::F32(_) => ValKind::F32,
            Self::F64(_) => ValKind::F64,
            Self::FuncRef(_) => ValKind::FuncRef,
            Self::ExternRef(_) => ValKind::ExternRef,
        }
    }

    /// A null value of a reference kind, or zero of a numeric kind.
    pub fn default_for(kind: ValKind) -> Option<Self> {
        Some(match kind {
            ValKind::I32 => Self::I32(0),
            ValKind::I64 => Self::I64(0),
            ValKind::F32 => Self::F32(0),
            ValKind::F64 => Self::F64(0),
            ValKind::FuncRef => Self::FuncRef(None),
            ValKind::ExternRef => Self::ExternRef(None),
            ValKind::V128 => return None,
        })
    }

    fn wrong_kind(&self, expected: ValKind) -> Error {
        Error::WrongKind {
            expected,
            actual: self.kind(),
        }
    }

    /// Read an `i32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] for any other kind.
    pub fn i32(&self) -> Result<i32, Error> {
        match self {
            Self::I32(v) => Ok(*v),
            _ => Err(self.wrong_kind(ValKind::I32)),
        }
    }

    /// Read an `i64`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] for any other kind.
    pub fn i64(&self) -> Result<i64, Error> {
        match self {
            Self::I64(v) => Ok(*v),
            _ => Err(self.wrong_kind(ValKind::I64)),
        }
    }

    /// Read an `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] for any other kind.
    pub fn f32(&self) -> Result<f32, Error> {
        match self {
            Self::F32(bits) => Ok(f32::from_bits(*bits)),
            _ => Err(self.wrong_kind(ValKind::F32)),
        }
    }

    /// Read an `f64`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] for any other kind.
    pub fn f64(&self) -> Result<f64, Error> {
        match self {
            Self::F64(bits) => Ok(f64::from_bits(*bits)),
            _ => Err(self.wrong_kind(ValKind::F64)),
        }
    }

    /// Read a function reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] for any other kind.
    pub fn funcref(&self) -> Result<Option<&Func>, Error> {
        match self {
            Self::FuncRef(f) => Ok(f.as_ref()),
            _ => Err(self.wrong_kind(ValKind::FuncRef)),
        }
    }

    /// Read a host reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] for any other kind.
    pub fn externref(&self) -> Result<Option<&ExternRef>, Error> {
        match self {
            Self::ExternRef(r) => Ok(r.as_ref()),
            _ => Err(self.wrong_kind(ValKind::ExternRef)),
        }
    }

    /// Build the native representation. Reference payloads are copied, so
    /// the result owns its own handles.
    ///
    /// Panics if a function reference belongs to a different store.
    pub(crate) fn to_native(&self, store: &Arc<StoreShared>) -> wb_val_t {
        let (kind, of) = match self {
            Self::I32(v) => (WB_I32, wb_val_union { i32: *v }),
            Self::I64(v) => (WB_I64, wb_val_union { i64: *v }),
            Self::F32(bits) => (WB_F32, wb_val_union { f32: *bits }),
            Self::F64(bits) => (WB_F64, wb_val_union { f64: *bits }),
            Self::FuncRef(func) => {
                let funcref = match func {
                    Some(func) => {
                        func.handle.store().assert_same(store);
                        Box::into_raw(wb_func_copy(func.handle.native()))
                    }
                    None => ptr::null_mut(),
                };
                (WB_FUNCREF, wb_val_union { funcref })
            }
            Self::ExternRef(externref) => {
                let externref = match externref {
                    Some(externref) => Box::into_raw(externref.to_native()),
                    None => ptr::null_mut(),
                };
                (WB_EXTERNREF, wb_val_union { externref })
            }
        };
        wb_val_t { kind, of }
    }

    /// Read a native value. Reference payloads are copied, not taken.
    ///
    /// Returns `None` for kinds the host cannot represent.
    ///
    /// # Safety
    ///
    /// `raw` must be a well-formed value produced by the native layer for
    /// `store`.
    pub(crate) unsafe fn from_native(raw: &wb_val_t, store: &Arc<StoreShared>) -> Option<Self> {
        let val = unsafe {
            match raw.kind {
                WB_I32 => Self::I32(raw.of.i32),
                WB_I64 => Self::I64(raw.of.i64),
                WB_F32 => Self::F32(raw.of.f32),
                WB_F64 => Self::F64(raw.of.f64),
                WB_FUNCREF => Self::FuncRef(raw.of.funcref.as_ref().map(|func| Func {
                    handle: Handle::owned(wb_func_copy(func), store),
                })),
                WB_EXTERNREF => {
                    Self::ExternRef(raw.of.externref.as_ref().map(|r| ExternRef::from_native(r)))
                }
                _ => return None,
            }
        };
        Some(val)
    }
}

impl From<i32> for Val {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Val {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for Val {
    fn from(v: f32) -> Self {
        Self::F32(v.to_bits())
    }
}

impl From<f64> for Val {
    fn from(v: f64) -> Self {
        Self::F64(v.to_bits())
    }
}

impl From<Func> for Val {
    fn from(f: Func) -> Self {
        Self::FuncRef(Some(f))
    }
}

impl From<ExternRef> for Val {
    fn from(r: ExternRef) -> Self {
        Self::ExternRef(Some(r))
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(bits) => write!(f, "{}", f32::from_bits(*bits)),
            Self::F64(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Self::FuncRef(None) | Self::ExternRef(None) => write!(f, "null"),
            Self::FuncRef(Some(_)) => write!(f, "<funcref>"),
            Self::ExternRef(Some(_)) => write!(f, "<externref>"),
        }
    }
}

type HostData = Arc<dyn Any + Send + Sync>;

/// An opaque host object that can be passed through wasm as `externref`.
///
/// Clones share the object. An `ExternRef` read back from wasm is
/// [`ptr_eq`](ExternRef::ptr_eq) to the one that was passed in.
#[derive(Clone)]
pub struct ExternRef {
    data: HostData,
}

impl ExternRef {
    /// Wrap a host object.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            data: Arc::new(value),
        }
    }

    /// The wrapped object.
    pub fn data(&self) -> &(dyn Any + Send + Sync) {
        &*self.data
    }

    /// The wrapped object, if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Returns `true` if both references wrap the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }

    fn to_native(&self) -> Box<wasmbridge_sys::wb_externref_t> {
        let data = Box::into_raw(Box::new(Arc::clone(&self.data)));
        wb_externref_new(data as usize, Some(release_host_data))
    }

    /// # Safety
    ///
    /// `raw` must have been created by [`ExternRef::to_native`].
    unsafe fn from_native(raw: &wasmbridge_sys::wb_externref_t) -> Self {
        let data = wb_externref_data(raw) as *const HostData;
        Self {
            data: Arc::clone(unsafe { &*data }),
        }
    }
}

extern "C" fn release_host_data(data: usize) {
    drop(unsafe { Box::from_raw(data as *mut HostData) });
}

impl fmt::Debug for ExternRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternRef").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AsContextMut, Engine, Store};

    fn round_trip(val: &Val) -> Val {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let cx = store.as_context_mut();

        let native = val.to_native(cx.shared);
        unsafe { Val::from_native(&native, cx.shared) }.unwrap()
    }

    #[test]
    fn test_numeric_round_trip() {
        assert_eq!(round_trip(&Val::I32(-7)).i32().unwrap(), -7);
        assert_eq!(round_trip(&Val::I64(i64::MAX)).i64().unwrap(), i64::MAX);
        assert_eq!(round_trip(&Val::from(1.5f32)).f32().unwrap(), 1.5);
        assert_eq!(round_trip(&Val::from(-2.25f64)).f64().unwrap(), -2.25);
    }

    #[test]
    fn test_nan_bits_preserved() {
        let bits = 0x7fc0_0001;
        match round_trip(&Val::F32(bits)) {
            Val::F32(out) => assert_eq!(out, bits),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wrong_kind() {
        let val = Val::I64(3);

        let err = val.i32().unwrap_err();
        assert!(matches!(
            err,
            Error::WrongKind {
                expected: ValKind::I32,
                actual: ValKind::I64,
            }
        ));
        assert!(val.f64().is_err());
        assert!(val.funcref().is_err());
        assert!(val.externref().is_err());
    }

    #[test]
    fn test_null_refs_round_trip() {
        assert!(round_trip(&Val::FuncRef(None)).funcref().unwrap().is_none());
        assert!(
            round_trip(&Val::ExternRef(None))
                .externref()
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_externref_identity() {
        let host = ExternRef::new(String::from("payload"));
        let back = round_trip(&Val::from(host.clone()));
        let back = back.externref().unwrap().unwrap();

        assert!(ExternRef::ptr_eq(&host, back));
        assert_eq!(back.downcast_ref::<String>().unwrap(), "payload");
        assert!(back.downcast_ref::<i32>().is_none());
    }

    #[test]
    fn test_externref_released() {
        let host = ExternRef::new(5u8);
        let weak = Arc::downgrade(&host.data);
        {
            let engine = Engine::default();
            let mut store = Store::new(&engine);
            let cx = store.as_context_mut();
            let native = Val::from(host.clone()).to_native(cx.shared);
            assert_eq!(Arc::strong_count(&host.data), 2);
            drop(native);
        }
        assert_eq!(Arc::strong_count(&host.data), 1);
        drop(host);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_default_for_kind() {
        assert_eq!(Val::default_for(ValKind::I64).unwrap().i64().unwrap(), 0);
        assert!(Val::default_for(ValKind::V128).is_none());
        assert_eq!(Val::default_for(ValKind::ExternRef).unwrap().kind(), ValKind::ExternRef);
    }

    #[test]
    fn test_display() {
        assert_eq!(Val::I32(4).to_string(), "4");
        assert_eq!(Val::from(0.5f64).to_string(), "0.5");
        assert_eq!(Val::FuncRef(None).to_string(), "null");
    }
}
