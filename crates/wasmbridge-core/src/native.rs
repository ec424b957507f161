//! Translation between native handle types and the plain-data types of
//! `wasmbridge-common`.

#![allow(unsafe_code)]

use wasmbridge_common::{
    Error, ExportType, ExternType, FrameInfo, FuncType, GlobalType, ImportType, Limits,
    MemoryType, Mutability, TableType, Trap, TrapCode, ValKind,
};
use wasmbridge_sys::{
    WB_CONST, WB_EXTERN_FUNC, WB_EXTERN_GLOBAL, WB_EXTERN_MEMORY, WB_EXTERN_TABLE, WB_EXTERNREF,
    WB_F32, WB_F64, WB_FUNCREF, WB_I32, WB_I64, WB_LIMITS_MAX_NONE, WB_TRAP_CODE_BAD_CONVERSION_TO_INTEGER,
    WB_TRAP_CODE_BAD_SIGNATURE, WB_TRAP_CODE_HEAP_MISALIGNED, WB_TRAP_CODE_INDIRECT_CALL_TO_NULL,
    WB_TRAP_CODE_INTEGER_DIVISION_BY_ZERO, WB_TRAP_CODE_INTEGER_OVERFLOW, WB_TRAP_CODE_INTERRUPT,
    WB_TRAP_CODE_MEMORY_OUT_OF_BOUNDS, WB_TRAP_CODE_OUT_OF_FUEL, WB_TRAP_CODE_STACK_OVERFLOW,
    WB_TRAP_CODE_TABLE_OUT_OF_BOUNDS, WB_TRAP_CODE_UNREACHABLE_CODE_REACHED, WB_V128, WB_VAR,
    wb_byte_vec_t, wb_error_message, wb_error_t, wb_exporttype_name, wb_exporttype_t,
    wb_exporttype_type, wb_externtype_as_functype, wb_externtype_as_globaltype,
    wb_externtype_as_memorytype, wb_externtype_as_tabletype, wb_externtype_kind,
    wb_externtype_t, wb_frame_t, wb_functype_new, wb_functype_params, wb_functype_results,
    wb_functype_t, wb_globaltype_t, wb_importtype_module, wb_importtype_name, wb_importtype_t,
    wb_importtype_type, wb_limits_t, wb_memorytype_t, wb_tabletype_t, wb_trap_code,
    wb_trap_code_t, wb_trap_delete, wb_trap_frame_nth, wb_trap_frames_len, wb_trap_message,
    wb_trap_t, wb_valkind_t,
};

pub(crate) fn kind_to_native(kind: ValKind) -> wb_valkind_t {
    match kind {
        ValKind::I32 => WB_I32,
        ValKind::I64 => WB_I64,
        ValKind::F32 => WB_F32,
        ValKind::F64 => WB_F64,
        ValKind::V128 => WB_V128,
        ValKind::FuncRef => WB_FUNCREF,
        ValKind::ExternRef => WB_EXTERNREF,
    }
}

pub(crate) fn kind_from_native(kind: wb_valkind_t) -> ValKind {
    match kind {
        WB_I32 => ValKind::I32,
        WB_I64 => ValKind::I64,
        WB_F32 => ValKind::F32,
        WB_F64 => ValKind::F64,
        WB_FUNCREF => ValKind::FuncRef,
        WB_EXTERNREF => ValKind::ExternRef,
        _ => ValKind::V128,
    }
}

pub(crate) fn error_from_native(error: Box<wb_error_t>) -> Error {
    let mut message = wb_byte_vec_t::empty();
    wb_error_message(&error, &mut message);
    Error::engine(String::from_utf8_lossy(message.as_slice()))
}

/// Take ownership of a native trap and convert it.
///
/// # Safety
///
/// `trap` must be a non-null trap returned by the native layer and not yet
/// deleted.
pub(crate) unsafe fn trap_from_native(trap: *mut wb_trap_t) -> Trap {
    let trap = unsafe { Box::from_raw(trap) };

    let mut message = wb_byte_vec_t::empty();
    wb_trap_message(&trap, &mut message);
    let message = String::from_utf8_lossy(message.as_slice()).into_owned();

    let mut code: wb_trap_code_t = 0;
    let code = wb_trap_code(&trap, &mut code).then(|| trap_code_from_native(code)).flatten();

    let frames = (0..wb_trap_frames_len(&trap))
        .filter_map(|i| {
            let mut frame = wb_frame_t::default();
            wb_trap_frame_nth(&trap, i, &mut frame).then(|| FrameInfo {
                func_index: frame.func_index,
                func_name: if frame.func_name.is_none() {
                    None
                } else {
                    Some(unsafe { frame.func_name.as_str() }.to_owned())
                },
                func_offset: (frame.func_offset != usize::MAX).then_some(frame.func_offset),
                module_name: if frame.module_name.is_none() {
                    None
                } else {
                    Some(unsafe { frame.module_name.as_str() }.to_owned())
                },
                module_offset: (frame.module_offset != usize::MAX).then_some(frame.module_offset),
            })
        })
        .collect();

    wb_trap_delete(trap);
    Trap::with_details(message, code, frames)
}

fn trap_code_from_native(code: wb_trap_code_t) -> Option<TrapCode> {
    Some(match code {
        WB_TRAP_CODE_STACK_OVERFLOW => TrapCode::StackOverflow,
        WB_TRAP_CODE_MEMORY_OUT_OF_BOUNDS => TrapCode::MemoryOutOfBounds,
        WB_TRAP_CODE_HEAP_MISALIGNED => TrapCode::HeapMisaligned,
        WB_TRAP_CODE_TABLE_OUT_OF_BOUNDS => TrapCode::TableOutOfBounds,
        WB_TRAP_CODE_INDIRECT_CALL_TO_NULL => TrapCode::IndirectCallToNull,
        WB_TRAP_CODE_BAD_SIGNATURE => TrapCode::BadSignature,
        WB_TRAP_CODE_INTEGER_OVERFLOW => TrapCode::IntegerOverflow,
        WB_TRAP_CODE_INTEGER_DIVISION_BY_ZERO => TrapCode::IntegerDivisionByZero,
        WB_TRAP_CODE_BAD_CONVERSION_TO_INTEGER => TrapCode::BadConversionToInteger,
        WB_TRAP_CODE_UNREACHABLE_CODE_REACHED => TrapCode::UnreachableCodeReached,
        WB_TRAP_CODE_INTERRUPT => TrapCode::Interrupt,
        WB_TRAP_CODE_OUT_OF_FUEL => TrapCode::OutOfFuel,
        _ => return None,
    })
}

pub(crate) fn functype_to_native(ty: &FuncType) -> Box<wb_functype_t> {
    let params: Vec<_> = ty.params().iter().copied().map(kind_to_native).collect();
    let results: Vec<_> = ty.results().iter().copied().map(kind_to_native).collect();
    unsafe { wb_functype_new(params.as_ptr(), params.len(), results.as_ptr(), results.len()) }
}

pub(crate) fn functype_from_native(ty: &wb_functype_t) -> FuncType {
    let read = |f: extern "C" fn(&wb_functype_t, &mut usize) -> *const wb_valkind_t| {
        let mut len = 0;
        let ptr = f(ty, &mut len);
        let kinds = if len == 0 {
            &[][..]
        } else {
            unsafe { std::slice::from_raw_parts(ptr, len) }
        };
        kinds.iter().copied().map(kind_from_native).collect::<Vec<_>>()
    };
    FuncType::new(read(wb_functype_params), read(wb_functype_results))
}

pub(crate) fn globaltype_to_native(ty: GlobalType) -> wb_globaltype_t {
    wb_globaltype_t {
        content: kind_to_native(ty.content),
        mutability: match ty.mutability {
            Mutability::Const => WB_CONST,
            Mutability::Var => WB_VAR,
        },
    }
}

pub(crate) fn globaltype_from_native(ty: wb_globaltype_t) -> GlobalType {
    let mutability = if ty.mutability == WB_VAR {
        Mutability::Var
    } else {
        Mutability::Const
    };
    GlobalType::new(kind_from_native(ty.content), mutability)
}

fn limits_to_native(limits: Limits) -> wb_limits_t {
    wb_limits_t {
        min: limits.min,
        max: limits.max.unwrap_or(WB_LIMITS_MAX_NONE),
    }
}

fn limits_from_native(limits: wb_limits_t) -> Limits {
    Limits::new(limits.min, limits.max())
}

pub(crate) fn memorytype_to_native(ty: MemoryType) -> wb_memorytype_t {
    wb_memorytype_t {
        limits: limits_to_native(ty.limits),
        is_64: ty.is_64,
    }
}

pub(crate) fn memorytype_from_native(ty: wb_memorytype_t) -> MemoryType {
    MemoryType {
        limits: limits_from_native(ty.limits),
        is_64: ty.is_64,
    }
}

pub(crate) fn tabletype_to_native(ty: TableType) -> wb_tabletype_t {
    wb_tabletype_t {
        element: kind_to_native(ty.element),
        limits: limits_to_native(ty.limits),
    }
}

pub(crate) fn tabletype_from_native(ty: wb_tabletype_t) -> TableType {
    TableType {
        element: kind_from_native(ty.element),
        limits: limits_from_native(ty.limits),
    }
}

fn externtype_from_native(ty: &wb_externtype_t) -> Option<ExternType> {
    match wb_externtype_kind(ty) {
        WB_EXTERN_FUNC => wb_externtype_as_functype(ty).map(|f| functype_from_native(f).into()),
        WB_EXTERN_GLOBAL => {
            wb_externtype_as_globaltype(ty).map(|g| globaltype_from_native(*g).into())
        }
        WB_EXTERN_MEMORY => {
            wb_externtype_as_memorytype(ty).map(|m| memorytype_from_native(*m).into())
        }
        WB_EXTERN_TABLE => wb_externtype_as_tabletype(ty).map(|t| tabletype_from_native(*t).into()),
        _ => None,
    }
}

pub(crate) fn importtype_from_native(ty: &wb_importtype_t) -> Option<ImportType> {
    // Names borrow from the module, which outlives this call.
    let module = unsafe { wb_importtype_module(ty).as_str() }.to_owned();
    let name = unsafe { wb_importtype_name(ty).as_str() }.to_owned();
    Some(ImportType {
        module,
        name,
        ty: externtype_from_native(wb_importtype_type(ty))?,
    })
}

pub(crate) fn exporttype_from_native(ty: &wb_exporttype_t) -> Option<ExportType> {
    let name = unsafe { wb_exporttype_name(ty).as_str() }.to_owned();
    Some(ExportType {
        name,
        ty: externtype_from_native(wb_exporttype_type(ty))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping_is_bijective() {
        for kind in [
            ValKind::I32,
            ValKind::I64,
            ValKind::F32,
            ValKind::F64,
            ValKind::V128,
            ValKind::FuncRef,
            ValKind::ExternRef,
        ] {
            assert_eq!(kind_from_native(kind_to_native(kind)), kind);
        }
    }

    #[test]
    fn test_functype_through_native() {
        let ty = FuncType::new([ValKind::I32, ValKind::ExternRef], [ValKind::F64]);
        let native = functype_to_native(&ty);

        assert_eq!(functype_from_native(&native), ty);
    }

    #[test]
    fn test_limits_without_maximum() {
        let ty = TableType::new(ValKind::FuncRef, 2, None);
        let native = tabletype_to_native(ty);

        assert_eq!(native.limits.max, WB_LIMITS_MAX_NONE);
        assert_eq!(tabletype_from_native(native), ty);
    }

    #[test]
    fn test_global_mutability() {
        let ty = GlobalType::new(ValKind::I64, Mutability::Var);
        assert_eq!(globaltype_from_native(globaltype_to_native(ty)), ty);
    }

    #[test]
    fn test_unknown_trap_code() {
        assert_eq!(trap_code_from_native(200), None);
        assert_eq!(
            trap_code_from_native(WB_TRAP_CODE_OUT_OF_FUEL),
            Some(TrapCode::OutOfFuel)
        );
    }
}
