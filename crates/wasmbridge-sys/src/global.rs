use wasmtime::Global;

use crate::{handle_result, wb_context_t, wb_error_t, wb_global_t, wb_globaltype_t, wb_val_t};

pub unsafe extern "C" fn wb_global_new(
    cx: wb_context_t,
    ty: &wb_globaltype_t,
    val: &wb_val_t,
    global_ret: &mut *mut wb_global_t,
) -> Option<Box<wb_error_t>> {
    let result = unsafe {
        cx.with(|mut store| {
            let ty = ty.to_wasmtime()?;
            let val = val.to_val(&mut store)?;
            Global::new(&mut store, ty, val)
        })
    };
    handle_result(result, |global| {
        *global_ret = Box::into_raw(Box::new(wb_global_t::new(global)));
    })
}

pub unsafe extern "C" fn wb_global_type(cx: wb_context_t, global: &wb_global_t) -> wb_globaltype_t {
    let ty = unsafe { cx.with(|store| global.global().ty(&store)) };
    wb_globaltype_t::from_wasmtime(&ty)
}

pub unsafe extern "C" fn wb_global_get(
    cx: wb_context_t,
    global: &wb_global_t,
    val_ret: &mut wb_val_t,
) -> Option<Box<wb_error_t>> {
    let result = unsafe {
        cx.with(|mut store| {
            let val = global.global().get(&mut store);
            wb_val_t::from_val(&mut store, &val)
        })
    };
    handle_result(result, |val| *val_ret = val)
}

pub unsafe extern "C" fn wb_global_set(
    cx: wb_context_t,
    global: &wb_global_t,
    val: &wb_val_t,
) -> Option<Box<wb_error_t>> {
    let result = unsafe {
        cx.with(|mut store| {
            let val = val.to_val(&mut store)?;
            global.global().set(&mut store, val)
        })
    };
    handle_result(result, |()| {})
}
