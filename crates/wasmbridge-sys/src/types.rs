use anyhow::{anyhow, bail};
use wasmtime::{
    Engine, ExternType, FuncType, GlobalType, HeapType, MemoryType, Mutability, RefType,
    TableType, ValType,
};

use crate::{
    WB_EXTERNREF, WB_F32, WB_F64, WB_FUNCREF, WB_I32, WB_I64, WB_V128, slice_from_raw_parts,
    wb_name_t, wb_valkind_t,
};

pub(crate) fn valtype_to_kind(ty: &ValType) -> wb_valkind_t {
    match ty {
        ValType::I32 => WB_I32,
        ValType::I64 => WB_I64,
        ValType::F32 => WB_F32,
        ValType::F64 => WB_F64,
        ValType::V128 => WB_V128,
        ValType::Ref(r) => reftype_to_kind(r),
    }
}

fn reftype_to_kind(ty: &RefType) -> wb_valkind_t {
    match ty.heap_type() {
        HeapType::Extern => WB_EXTERNREF,
        _ => WB_FUNCREF,
    }
}

pub(crate) fn kind_to_valtype(kind: wb_valkind_t) -> anyhow::Result<ValType> {
    Ok(match kind {
        WB_I32 => ValType::I32,
        WB_I64 => ValType::I64,
        WB_F32 => ValType::F32,
        WB_F64 => ValType::F64,
        WB_V128 => ValType::V128,
        WB_FUNCREF => ValType::FUNCREF,
        WB_EXTERNREF => ValType::EXTERNREF,
        other => bail!("unknown value kind {other}"),
    })
}

fn kind_to_reftype(kind: wb_valkind_t) -> anyhow::Result<RefType> {
    match kind {
        WB_FUNCREF => Ok(RefType::FUNCREF),
        WB_EXTERNREF => Ok(RefType::EXTERNREF),
        other => bail!("value kind {other} is not a reference"),
    }
}

/// A function signature as lists of value kinds.
#[derive(Clone)]
pub struct wb_functype_t {
    pub(crate) params: Vec<wb_valkind_t>,
    pub(crate) results: Vec<wb_valkind_t>,
}

impl wb_functype_t {
    pub(crate) fn from_wasmtime(ty: &FuncType) -> Self {
        Self {
            params: ty.params().map(|p| valtype_to_kind(&p)).collect(),
            results: ty.results().map(|r| valtype_to_kind(&r)).collect(),
        }
    }

    pub(crate) fn to_wasmtime(&self, engine: &Engine) -> anyhow::Result<FuncType> {
        let params = self
            .params
            .iter()
            .map(|k| kind_to_valtype(*k))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let results = self
            .results
            .iter()
            .map(|k| kind_to_valtype(*k))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(FuncType::new(engine, params, results))
    }
}

pub unsafe extern "C" fn wb_functype_new(
    params: *const wb_valkind_t,
    nparams: usize,
    results: *const wb_valkind_t,
    nresults: usize,
) -> Box<wb_functype_t> {
    Box::new(wb_functype_t {
        params: unsafe { slice_from_raw_parts(params, nparams) }.to_vec(),
        results: unsafe { slice_from_raw_parts(results, nresults) }.to_vec(),
    })
}

pub extern "C" fn wb_functype_params(ty: &wb_functype_t, len: &mut usize) -> *const wb_valkind_t {
    *len = ty.params.len();
    ty.params.as_ptr()
}

pub extern "C" fn wb_functype_results(ty: &wb_functype_t, len: &mut usize) -> *const wb_valkind_t {
    *len = ty.results.len();
    ty.results.as_ptr()
}

pub extern "C" fn wb_functype_delete(_ty: Box<wb_functype_t>) {}

pub type wb_mutability_t = u8;
pub const WB_CONST: wb_mutability_t = 0;
pub const WB_VAR: wb_mutability_t = 1;

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct wb_globaltype_t {
    pub content: wb_valkind_t,
    pub mutability: wb_mutability_t,
}

impl wb_globaltype_t {
    pub(crate) fn from_wasmtime(ty: &GlobalType) -> Self {
        Self {
            content: valtype_to_kind(ty.content()),
            mutability: match ty.mutability() {
                Mutability::Const => WB_CONST,
                Mutability::Var => WB_VAR,
            },
        }
    }

    pub(crate) fn to_wasmtime(self) -> anyhow::Result<GlobalType> {
        let mutability = match self.mutability {
            WB_CONST => Mutability::Const,
            WB_VAR => Mutability::Var,
            other => bail!("unknown mutability {other}"),
        };
        Ok(GlobalType::new(kind_to_valtype(self.content)?, mutability))
    }
}

/// Marks an absent maximum in [`wb_limits_t`].
pub const WB_LIMITS_MAX_NONE: u64 = u64::MAX;

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct wb_limits_t {
    pub min: u64,
    pub max: u64,
}

impl wb_limits_t {
    fn new(min: u64, max: Option<u64>) -> Self {
        Self {
            min,
            max: max.unwrap_or(WB_LIMITS_MAX_NONE),
        }
    }

    pub fn max(&self) -> Option<u64> {
        (self.max != WB_LIMITS_MAX_NONE).then_some(self.max)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct wb_memorytype_t {
    pub limits: wb_limits_t,
    pub is_64: bool,
}

impl wb_memorytype_t {
    pub(crate) fn from_wasmtime(ty: &MemoryType) -> Self {
        Self {
            limits: wb_limits_t::new(ty.minimum(), ty.maximum()),
            is_64: ty.is_64(),
        }
    }

    pub(crate) fn to_wasmtime(self) -> anyhow::Result<MemoryType> {
        let min = self.limits.min;
        let max = self.limits.max();
        if self.is_64 {
            Ok(MemoryType::new64(min, max))
        } else {
            Ok(MemoryType::new(
                min.try_into()?,
                max.map(TryInto::try_into).transpose()?,
            ))
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct wb_tabletype_t {
    pub element: wb_valkind_t,
    pub limits: wb_limits_t,
}

impl wb_tabletype_t {
    pub(crate) fn from_wasmtime(ty: &TableType) -> Self {
        Self {
            element: reftype_to_kind(ty.element()),
            limits: wb_limits_t::new(u64::from(ty.minimum()), ty.maximum().map(u64::from)),
        }
    }

    pub(crate) fn to_wasmtime(self) -> anyhow::Result<TableType> {
        Ok(TableType::new(
            kind_to_reftype(self.element)?,
            self.limits.min.try_into()?,
            self.limits.max().map(TryInto::try_into).transpose()?,
        ))
    }
}

pub type wb_externkind_t = u8;
pub const WB_EXTERN_FUNC: wb_externkind_t = 0;
pub const WB_EXTERN_GLOBAL: wb_externkind_t = 1;
pub const WB_EXTERN_TABLE: wb_externkind_t = 2;
pub const WB_EXTERN_MEMORY: wb_externkind_t = 3;
pub const WB_EXTERN_UNSUPPORTED: wb_externkind_t = 255;

pub(crate) enum CExternType {
    Func(wb_functype_t),
    Global(wb_globaltype_t),
    Memory(wb_memorytype_t),
    Table(wb_tabletype_t),
}

/// Type of an import or export.
pub struct wb_externtype_t {
    pub(crate) which: CExternType,
}

impl wb_externtype_t {
    pub(crate) fn from_wasmtime(ty: &ExternType) -> anyhow::Result<Self> {
        let which = match ty {
            ExternType::Func(f) => CExternType::Func(wb_functype_t::from_wasmtime(f)),
            ExternType::Global(g) => CExternType::Global(wb_globaltype_t::from_wasmtime(g)),
            ExternType::Memory(m) => CExternType::Memory(wb_memorytype_t::from_wasmtime(m)),
            ExternType::Table(t) => CExternType::Table(wb_tabletype_t::from_wasmtime(t)),
            #[allow(unreachable_patterns)]
            _ => return Err(anyhow!("unsupported extern type")),
        };
        Ok(Self { which })
    }
}

pub extern "C" fn wb_externtype_kind(ty: &wb_externtype_t) -> wb_externkind_t {
    match ty.which {
        CExternType::Func(_) => WB_EXTERN_FUNC,
        CExternType::Global(_) => WB_EXTERN_GLOBAL,
        CExternType::Memory(_) => WB_EXTERN_MEMORY,
        CExternType::Table(_) => WB_EXTERN_TABLE,
    }
}

pub extern "C" fn wb_externtype_as_functype(ty: &wb_externtype_t) -> Option<&wb_functype_t> {
    match &ty.which {
        CExternType::Func(f) => Some(f),
        _ => None,
    }
}

pub extern "C" fn wb_externtype_as_globaltype(ty: &wb_externtype_t) -> Option<&wb_globaltype_t> {
    match &ty.which {
        CExternType::Global(g) => Some(g),
        _ => None,
    }
}

pub extern "C" fn wb_externtype_as_memorytype(ty: &wb_externtype_t) -> Option<&wb_memorytype_t> {
    match &ty.which {
        CExternType::Memory(m) => Some(m),
        _ => None,
    }
}

pub extern "C" fn wb_externtype_as_tabletype(ty: &wb_externtype_t) -> Option<&wb_tabletype_t> {
    match &ty.which {
        CExternType::Table(t) => Some(t),
        _ => None,
    }
}

/// A module import, owned by its module.
pub struct wb_importtype_t {
    pub(crate) module: String,
    pub(crate) name: String,
    pub(crate) ty: wb_externtype_t,
}

pub extern "C" fn wb_importtype_module(ty: &wb_importtype_t) -> wb_name_t {
    wb_name_t::new(&ty.module)
}

pub extern "C" fn wb_importtype_name(ty: &wb_importtype_t) -> wb_name_t {
    wb_name_t::new(&ty.name)
}

pub extern "C" fn wb_importtype_type(ty: &wb_importtype_t) -> &wb_externtype_t {
    &ty.ty
}

/// A module export, owned by its module.
pub struct wb_exporttype_t {
    pub(crate) name: String,
    pub(crate) ty: wb_externtype_t,
}

pub extern "C" fn wb_exporttype_name(ty: &wb_exporttype_t) -> wb_name_t {
    wb_name_t::new(&ty.name)
}

pub extern "C" fn wb_exporttype_type(ty: &wb_exporttype_t) -> &wb_externtype_t {
    &ty.ty
}
