use std::fmt;

use wasmtime::{Trap, WasmBacktrace};

use crate::{slice_from_raw_parts, wb_byte_vec_t, wb_name_t};

/// A trap raised by a host function, carrying its message verbatim.
#[derive(Debug)]
pub(crate) struct HostTrap(pub(crate) String);

impl fmt::Display for HostTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HostTrap {}

/// A trap raised while executing wasm.
pub struct wb_trap_t {
    pub(crate) error: anyhow::Error,
}

impl wb_trap_t {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self { error }
    }

    fn backtrace(&self) -> Option<&WasmBacktrace> {
        self.error.downcast_ref::<WasmBacktrace>()
    }
}

pub unsafe extern "C" fn wb_trap_new(message: *const u8, len: usize) -> Box<wb_trap_t> {
    let bytes = unsafe { slice_from_raw_parts(message, len) };
    let message = String::from_utf8_lossy(bytes).into_owned();
    Box::new(wb_trap_t::new(anyhow::Error::new(HostTrap(message))))
}

pub extern "C" fn wb_trap_message(trap: &wb_trap_t, message: &mut wb_byte_vec_t) {
    let text = if let Some(host) = trap.error.downcast_ref::<HostTrap>() {
        host.0.clone()
    } else if let Some(code) = trap.error.downcast_ref::<Trap>() {
        code.to_string()
    } else {
        format!("{:#}", trap.error)
    };
    message.set_buffer(text.into_bytes());
}

pub type wb_trap_code_t = u8;
pub const WB_TRAP_CODE_STACK_OVERFLOW: wb_trap_code_t = 0;
pub const WB_TRAP_CODE_MEMORY_OUT_OF_BOUNDS: wb_trap_code_t = 1;
pub const WB_TRAP_CODE_HEAP_MISALIGNED: wb_trap_code_t = 2;
pub const WB_TRAP_CODE_TABLE_OUT_OF_BOUNDS: wb_trap_code_t = 3;
pub const WB_TRAP_CODE_INDIRECT_CALL_TO_NULL: wb_trap_code_t = 4;
pub const WB_TRAP_CODE_BAD_SIGNATURE: wb_trap_code_t = 5;
pub const WB_TRAP_CODE_INTEGER_OVERFLOW: wb_trap_code_t = 6;
pub const WB_TRAP_CODE_INTEGER_DIVISION_BY_ZERO: wb_trap_code_t = 7;
pub const WB_TRAP_CODE_BAD_CONVERSION_TO_INTEGER: wb_trap_code_t = 8;
pub const WB_TRAP_CODE_UNREACHABLE_CODE_REACHED: wb_trap_code_t = 9;
pub const WB_TRAP_CODE_INTERRUPT: wb_trap_code_t = 10;
pub const WB_TRAP_CODE_OUT_OF_FUEL: wb_trap_code_t = 11;

/// Store the engine trap code in `code`; returns `false` for host traps
/// and codes without a mapping.
pub extern "C" fn wb_trap_code(trap: &wb_trap_t, code: &mut wb_trap_code_t) -> bool {
    let Some(trap) = trap.error.downcast_ref::<Trap>() else {
        return false;
    };
    *code = match trap {
        Trap::StackOverflow => WB_TRAP_CODE_STACK_OVERFLOW,
        Trap::MemoryOutOfBounds => WB_TRAP_CODE_MEMORY_OUT_OF_BOUNDS,
        Trap::HeapMisaligned => WB_TRAP_CODE_HEAP_MISALIGNED,
        Trap::TableOutOfBounds => WB_TRAP_CODE_TABLE_OUT_OF_BOUNDS,
        Trap::IndirectCallToNull => WB_TRAP_CODE_INDIRECT_CALL_TO_NULL,
        Trap::BadSignature => WB_TRAP_CODE_BAD_SIGNATURE,
        Trap::IntegerOverflow => WB_TRAP_CODE_INTEGER_OVERFLOW,
        Trap::IntegerDivisionByZero => WB_TRAP_CODE_INTEGER_DIVISION_BY_ZERO,
        Trap::BadConversionToInteger => WB_TRAP_CODE_BAD_CONVERSION_TO_INTEGER,
        Trap::UnreachableCodeReached => WB_TRAP_CODE_UNREACHABLE_CODE_REACHED,
        Trap::Interrupt => WB_TRAP_CODE_INTERRUPT,
        Trap::OutOfFuel => WB_TRAP_CODE_OUT_OF_FUEL,
        _ => return false,
    };
    true
}

/// One frame of a trap's wasm backtrace. The names borrow from the trap.
#[repr(C)]
pub struct wb_frame_t {
    pub func_index: u32,
    /// `usize::MAX` when unknown.
    pub func_offset: usize,
    pub func_name: wb_name_t,
    /// `usize::MAX` when unknown.
    pub module_offset: usize,
    pub module_name: wb_name_t,
}

impl Default for wb_frame_t {
    fn default() -> Self {
        Self {
            func_index: 0,
            func_offset: usize::MAX,
            func_name: wb_name_t::none(),
            module_offset: usize::MAX,
            module_name: wb_name_t::none(),
        }
    }
}

pub extern "C" fn wb_trap_frames_len(trap: &wb_trap_t) -> usize {
    trap.backtrace().map_or(0, |bt| bt.frames().len())
}

pub extern "C" fn wb_trap_frame_nth(trap: &wb_trap_t, index: usize, frame_ret: &mut wb_frame_t) -> bool {
    let Some(frame) = trap.backtrace().and_then(|bt| bt.frames().get(index)) else {
        return false;
    };
    *frame_ret = wb_frame_t {
        func_index: frame.func_index(),
        func_offset: frame.func_offset().unwrap_or(usize::MAX),
        func_name: frame.func_name().map_or(wb_name_t::none(), wb_name_t::new),
        module_offset: frame.module_offset().unwrap_or(usize::MAX),
        module_name: frame.module().name().map_or(wb_name_t::none(), wb_name_t::new),
    };
    true
}

pub extern "C" fn wb_trap_delete(_trap: Box<wb_trap_t>) {}
