use std::str;

use wasmtime::{AsContextMut, Caller, Func, Val};

use crate::{
    ForeignData, handle_call_error, handle_result, slice_from_raw_parts,
    slice_from_raw_parts_mut, wb_caller_t, wb_context_t, wb_error_t, wb_extern_t,
    wb_finalizer_t, wb_func_t, wb_functype_t, wb_trap_t, wb_val_t,
};

/// Entry point the engine calls when wasm invokes a host function.
///
/// `args` and `results` are only valid for the duration of the call. The
/// callback overwrites each result slot and returns null, or returns a trap
/// to abort the calling wasm.
pub type wb_func_callback_t = for<'a> extern "C" fn(
    env: usize,
    caller: *mut wb_caller_t<'a>,
    args: *const wb_val_t,
    nargs: usize,
    results: *mut wb_val_t,
    nresults: usize,
) -> *mut wb_trap_t;

/// Create a host function. `finalizer(env)` runs when the native function
/// object is destroyed, which happens when its store is deleted or, if this
/// call fails, before it returns.
pub unsafe extern "C" fn wb_func_new_with_env(
    cx: wb_context_t,
    ty: &wb_functype_t,
    callback: wb_func_callback_t,
    env: usize,
    finalizer: Option<wb_finalizer_t>,
    func_ret: &mut *mut wb_func_t,
) -> Option<Box<wb_error_t>> {
    let foreign = ForeignData {
        data: env,
        finalizer,
    };
    let result = unsafe {
        cx.with(|mut store| -> anyhow::Result<Func> {
            let ty = ty.to_wasmtime(store.engine())?;
            Ok(Func::new(&mut store, ty, move |caller, params, results| {
                invoke(callback, &foreign, caller, params, results)
            }))
        })
    };
    handle_result(result, |func| {
        *func_ret = Box::into_raw(Box::new(wb_func_t::new(func)));
    })
}

fn invoke(
    callback: wb_func_callback_t,
    foreign: &ForeignData,
    caller: Caller<'_, ()>,
    params: &[Val],
    results: &mut [Val],
) -> anyhow::Result<()> {
    let mut caller = wb_caller_t { caller };
    let args = {
        let mut cx = caller.caller.as_context_mut();
        params
            .iter()
            .map(|p| wb_val_t::from_val(&mut cx, p))
            .collect::<anyhow::Result<Vec<_>>>()?
    };
    let mut out = results
        .iter()
        .map(|_| wb_val_t::default())
        .collect::<Vec<_>>();

    let trap = callback(
        foreign.data,
        &mut caller,
        args.as_ptr(),
        args.len(),
        out.as_mut_ptr(),
        out.len(),
    );
    if !trap.is_null() {
        let trap = unsafe { Box::from_raw(trap) };
        return Err(trap.error);
    }

    let mut cx = caller.caller.as_context_mut();
    for (slot, val) in results.iter_mut().zip(&out) {
        *slot = val.to_val(&mut cx)?;
    }
    Ok(())
}

pub unsafe extern "C" fn wb_func_call(
    cx: wb_context_t,
    func: &wb_func_t,
    args: *const wb_val_t,
    nargs: usize,
    results: *mut wb_val_t,
    nresults: usize,
    trap_ret: &mut *mut wb_trap_t,
) -> Option<Box<wb_error_t>> {
    let args = unsafe { slice_from_raw_parts(args, nargs) };
    let results = unsafe { slice_from_raw_parts_mut(results, nresults) };
    let result = unsafe {
        cx.with(|mut store| -> anyhow::Result<()> {
            let params = args
                .iter()
                .map(|a| a.to_val(&mut store))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let mut out = vec![Val::I32(0); results.len()];
            func.func().call(&mut store, &params, &mut out)?;
            for (slot, val) in results.iter_mut().zip(&out) {
                *slot = wb_val_t::from_val(&mut store, val)?;
            }
            Ok(())
        })
    };
    match result {
        Ok(()) => None,
        Err(error) => handle_call_error(error, trap_ret),
    }
}

pub unsafe extern "C" fn wb_func_type(cx: wb_context_t, func: &wb_func_t) -> Box<wb_functype_t> {
    let ty = unsafe { cx.with(|store| func.func().ty(&store)) };
    Box::new(wb_functype_t::from_wasmtime(&ty))
}

/// Look up an export of the instance that is calling the host function.
pub unsafe extern "C" fn wb_caller_export_get(
    caller: *mut wb_caller_t<'_>,
    name: *const u8,
    name_len: usize,
    item_ret: &mut *mut wb_extern_t,
) -> bool {
    let caller = unsafe { &mut *caller };
    let Ok(name) = str::from_utf8(unsafe { slice_from_raw_parts(name, name_len) }) else {
        return false;
    };
    match caller.caller.get_export(name) {
        Some(which) => {
            *item_ret = Box::into_raw(Box::new(wb_extern_t { which }));
            true
        }
        None => false,
    }
}
