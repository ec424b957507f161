use wasmtime::Memory;

use crate::{handle_result, wb_context_t, wb_error_t, wb_memory_t, wb_memorytype_t};

pub unsafe extern "C" fn wb_memory_new(
    cx: wb_context_t,
    ty: &wb_memorytype_t,
    memory_ret: &mut *mut wb_memory_t,
) -> Option<Box<wb_error_t>> {
    let result = unsafe {
        cx.with(|mut store| {
            let ty = ty.to_wasmtime()?;
            Memory::new(&mut store, ty)
        })
    };
    handle_result(result, |memory| {
        *memory_ret = Box::into_raw(Box::new(wb_memory_t::new(memory)));
    })
}

pub unsafe extern "C" fn wb_memory_type(cx: wb_context_t, memory: &wb_memory_t) -> wb_memorytype_t {
    let ty = unsafe { cx.with(|store| memory.memory().ty(&store)) };
    wb_memorytype_t::from_wasmtime(&ty)
}

/// Base of linear memory. Invalidated by `wb_memory_grow`.
pub unsafe extern "C" fn wb_memory_data(cx: wb_context_t, memory: &wb_memory_t) -> *mut u8 {
    unsafe { cx.with(|store| memory.memory().data_ptr(&store)) }
}

pub unsafe extern "C" fn wb_memory_data_size(cx: wb_context_t, memory: &wb_memory_t) -> usize {
    unsafe { cx.with(|store| memory.memory().data_size(&store)) }
}

/// Current size in pages.
pub unsafe extern "C" fn wb_memory_size(cx: wb_context_t, memory: &wb_memory_t) -> u64 {
    unsafe { cx.with(|store| memory.memory().size(&store)) }
}

pub unsafe extern "C" fn wb_memory_grow(
    cx: wb_context_t,
    memory: &wb_memory_t,
    delta: u64,
    prev_size: &mut u64,
) -> Option<Box<wb_error_t>> {
    let result = unsafe { cx.with(|mut store| memory.memory().grow(&mut store, delta)) };
    handle_result(result, |prev| *prev_size = prev)
}
