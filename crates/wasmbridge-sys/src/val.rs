use std::ptr;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use wasmtime::{AsContext, ExternRef, Ref, StoreContextMut, Val};

use crate::{ForeignData, wb_finalizer_t, wb_func_t};

pub type wb_valkind_t = u8;
pub const WB_I32: wb_valkind_t = 0;
pub const WB_I64: wb_valkind_t = 1;
pub const WB_F32: wb_valkind_t = 2;
pub const WB_F64: wb_valkind_t = 3;
pub const WB_V128: wb_valkind_t = 4;
pub const WB_EXTERNREF: wb_valkind_t = 128;
pub const WB_FUNCREF: wb_valkind_t = 129;

/// A reference to host data carried through wasm as an `externref`.
///
/// Every copy shares the same host data; its finalizer runs once the last
/// copy, native or host-side, is gone.
pub struct wb_externref_t {
    pub(crate) data: Arc<ForeignData>,
}

pub extern "C" fn wb_externref_new(
    data: usize,
    finalizer: Option<wb_finalizer_t>,
) -> Box<wb_externref_t> {
    Box::new(wb_externref_t {
        data: Arc::new(ForeignData { data, finalizer }),
    })
}

pub extern "C" fn wb_externref_data(externref: &wb_externref_t) -> usize {
    externref.data.data
}

pub extern "C" fn wb_externref_delete(_externref: Box<wb_externref_t>) {}

#[repr(C)]
#[derive(Clone, Copy)]
pub union wb_val_union {
    pub i32: i32,
    pub i64: i64,
    /// Raw IEEE bits.
    pub f32: u32,
    /// Raw IEEE bits.
    pub f64: u64,
    /// Owned by the containing value, null for `ref.null func`.
    pub funcref: *mut wb_func_t,
    /// Owned by the containing value, null for `ref.null extern`.
    pub externref: *mut wb_externref_t,
}

/// A tagged runtime value. Reference payloads are owned and freed on drop.
#[repr(C)]
pub struct wb_val_t {
    pub kind: wb_valkind_t,
    pub of: wb_val_union,
}

impl Default for wb_val_t {
    fn default() -> Self {
        Self {
            kind: WB_I32,
            of: wb_val_union { i32: 0 },
        }
    }
}

impl Drop for wb_val_t {
    fn drop(&mut self) {
        unsafe {
            match self.kind {
                WB_FUNCREF if !self.of.funcref.is_null() => {
                    drop(Box::from_raw(self.of.funcref));
                }
                WB_EXTERNREF if !self.of.externref.is_null() => {
                    drop(Box::from_raw(self.of.externref));
                }
                _ => {}
            }
        }
    }
}

impl wb_val_t {
    pub(crate) fn from_val(store: &mut StoreContextMut<'_, ()>, val: &Val) -> anyhow::Result<Self> {
        let (kind, of) = match val {
            Val::I32(i) => (WB_I32, wb_val_union { i32: *i }),
            Val::I64(i) => (WB_I64, wb_val_union { i64: *i }),
            Val::F32(bits) => (WB_F32, wb_val_union { f32: *bits }),
            Val::F64(bits) => (WB_F64, wb_val_union { f64: *bits }),
            Val::FuncRef(func) => {
                let funcref = match func {
                    Some(func) => Box::into_raw(Box::new(wb_func_t::new(*func))),
                    None => ptr::null_mut(),
                };
                (WB_FUNCREF, wb_val_union { funcref })
            }
            Val::ExternRef(externref) => {
                let externref = match externref {
                    Some(externref) => {
                        let data = externref
                            .data(store.as_context())?
                            .ok_or_else(|| anyhow!("externref has no host data"))?;
                        let foreign = data
                            .downcast_ref::<Arc<ForeignData>>()
                            .ok_or_else(|| anyhow!("externref was not created by this host"))?;
                        Box::into_raw(Box::new(wb_externref_t {
                            data: Arc::clone(foreign),
                        }))
                    }
                    None => ptr::null_mut(),
                };
                (WB_EXTERNREF, wb_val_union { externref })
            }
            _ => bail!("unsupported value type"),
        };
        Ok(Self { kind, of })
    }

    pub(crate) fn from_ref(store: &mut StoreContextMut<'_, ()>, r: Ref) -> anyhow::Result<Self> {
        match r {
            Ref::Func(func) => Self::from_val(store, &Val::FuncRef(func)),
            Ref::Extern(externref) => Self::from_val(store, &Val::ExternRef(externref)),
            _ => bail!("unsupported reference type"),
        }
    }

    pub(crate) fn to_val(&self, store: &mut StoreContextMut<'_, ()>) -> anyhow::Result<Val> {
        let val = unsafe {
            match self.kind {
                WB_I32 => Val::I32(self.of.i32),
                WB_I64 => Val::I64(self.of.i64),
                WB_F32 => Val::F32(self.of.f32),
                WB_F64 => Val::F64(self.of.f64),
                WB_FUNCREF => Val::FuncRef(self.of.funcref.as_ref().map(wb_func_t::func)),
                WB_EXTERNREF => match self.of.externref.as_ref() {
                    Some(externref) => {
                        let data = Arc::clone(&externref.data);
                        Val::ExternRef(Some(ExternRef::new(&mut *store, data)?))
                    }
                    None => Val::ExternRef(None),
                },
                other => bail!("unknown value kind {other}"),
            }
        };
        Ok(val)
    }

    pub(crate) fn to_ref(&self, store: &mut StoreContextMut<'_, ()>) -> anyhow::Result<Ref> {
        match self.to_val(store)? {
            Val::FuncRef(func) => Ok(Ref::Func(func)),
            Val::ExternRef(externref) => Ok(Ref::Extern(externref)),
            _ => bail!("table elements must be references"),
        }
    }
}
