//! Type-erased importable and exportable objects.

#![allow(unsafe_code)]

use std::sync::Arc;

use wasmbridge_common::ExternType;
use wasmbridge_sys::{
    wb_extern_as_func, wb_extern_as_global, wb_extern_as_memory, wb_extern_as_table, wb_extern_t,
    wb_func_as_extern, wb_global_as_extern, wb_memory_as_extern, wb_table_as_extern,
};

use crate::handle::Handle;
use crate::store::StoreShared;
use crate::{AsContextMut, Func, Global, Memory, Table};

/// A function, global, memory or table.
///
/// Exports come out of an instance as `Extern`s and imports go in as them.
/// Converting between an `Extern` and the concrete type shares ownership;
/// no native object is copied.
#[derive(Clone, Debug)]
pub enum Extern {
    /// A function.
    Func(Func),
    /// A global.
    Global(Global),
    /// A linear memory.
    Memory(Memory),
    /// A table.
    Table(Table),
}

impl Extern {
    /// Wrap an owned native extern. Returns `None` for kinds the host does
    /// not support.
    pub(crate) fn from_native(handle: Handle<wb_extern_t>) -> Option<Self> {
        let raw = handle.native();
        if let Some(func) = wb_extern_as_func(raw) {
            return Some(Self::Func(Func {
                handle: handle.view(func),
            }));
        }
        if let Some(global) = wb_extern_as_global(raw) {
            return Some(Self::Global(Global {
                handle: handle.view(global),
            }));
        }
        if let Some(memory) = wb_extern_as_memory(raw) {
            return Some(Self::Memory(Memory {
                handle: handle.view(memory),
            }));
        }
        wb_extern_as_table(raw).map(|table| {
            Self::Table(Table {
                handle: handle.view(table),
            })
        })
    }

    /// The native extern this object is viewed as.
    pub(crate) fn as_native(&self) -> &wb_extern_t {
        match self {
            Self::Func(f) => wb_func_as_extern(f.handle.native()),
            Self::Global(g) => wb_global_as_extern(g.handle.native()),
            Self::Memory(m) => wb_memory_as_extern(m.handle.native()),
            Self::Table(t) => wb_table_as_extern(t.handle.native()),
        }
    }

    pub(crate) fn store(&self) -> &Arc<StoreShared> {
        match self {
            Self::Func(f) => f.handle.store(),
            Self::Global(g) => g.handle.store(),
            Self::Memory(m) => m.handle.store(),
            Self::Table(t) => t.handle.store(),
        }
    }

    /// The type of the underlying object.
    pub fn ty(&self, store: impl AsContextMut) -> ExternType {
        match self {
            Self::Func(f) => f.ty(store).into(),
            Self::Global(g) => g.ty(store).into(),
            Self::Memory(m) => m.ty(store).into(),
            Self::Table(t) => t.ty(store).into(),
        }
    }

    /// Short name of the extern kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Func(_) => "func",
            Self::Global(_) => "global",
            Self::Memory(_) => "memory",
            Self::Table(_) => "table",
        }
    }

    /// The function, if this is one.
    pub fn as_func(&self) -> Option<&Func> {
        match self {
            Self::Func(f) => Some(f),
            _ => None,
        }
    }

    /// The global, if this is one.
    pub fn as_global(&self) -> Option<&Global> {
        match self {
            Self::Global(g) => Some(g),
            _ => None,
        }
    }

    /// The memory, if this is one.
    pub fn as_memory(&self) -> Option<&Memory> {
        match self {
            Self::Memory(m) => Some(m),
            _ => None,
        }
    }

    /// The table, if this is one.
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Convert into a function, if this is one.
    pub fn into_func(self) -> Option<Func> {
        match self {
            Self::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Convert into a global, if this is one.
    pub fn into_global(self) -> Option<Global> {
        match self {
            Self::Global(g) => Some(g),
            _ => None,
        }
    }

    /// Convert into a memory, if this is one.
    pub fn into_memory(self) -> Option<Memory> {
        match self {
            Self::Memory(m) => Some(m),
            _ => None,
        }
    }

    /// Convert into a table, if this is one.
    pub fn into_table(self) -> Option<Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Func> for Extern {
    fn from(f: Func) -> Self {
        Self::Func(f)
    }
}

impl From<Global> for Extern {
    fn from(g: Global) -> Self {
        Self::Global(g)
    }
}

impl From<Memory> for Extern {
    fn from(m: Memory) -> Self {
        Self::Memory(m)
    }
}

impl From<Table> for Extern {
    fn from(t: Table) -> Self {
        Self::Table(t)
    }
}
