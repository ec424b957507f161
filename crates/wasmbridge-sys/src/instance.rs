use std::str;

use wasmtime::{Extern, Instance};

use crate::{
    handle_call_error, slice_from_raw_parts, wb_byte_vec_t, wb_context_t, wb_error_t,
    wb_extern_t, wb_module_t, wb_trap_t,
};

/// An instantiated module.
pub struct wb_instance_t {
    pub(crate) instance: Instance,
}

/// Instantiate `module`. A trap in the start function is reported through
/// `trap_ret`; link failures are returned as errors.
pub unsafe extern "C" fn wb_instance_new(
    cx: wb_context_t,
    module: &wb_module_t,
    imports: *const *const wb_extern_t,
    nimports: usize,
    instance_ret: &mut *mut wb_instance_t,
    trap_ret: &mut *mut wb_trap_t,
) -> Option<Box<wb_error_t>> {
    let imports = unsafe { slice_from_raw_parts(imports, nimports) }
        .iter()
        .map(|import| unsafe { (**import).which.clone() })
        .collect::<Vec<Extern>>();
    let result = unsafe { cx.with(|mut store| Instance::new(&mut store, &module.module, &imports)) };
    match result {
        Ok(instance) => {
            *instance_ret = Box::into_raw(Box::new(wb_instance_t { instance }));
            None
        }
        Err(error) => handle_call_error(error, trap_ret),
    }
}

pub unsafe extern "C" fn wb_instance_export_get(
    cx: wb_context_t,
    instance: &wb_instance_t,
    name: *const u8,
    name_len: usize,
    item_ret: &mut *mut wb_extern_t,
) -> bool {
    let Ok(name) = str::from_utf8(unsafe { slice_from_raw_parts(name, name_len) }) else {
        return false;
    };
    let export = unsafe { cx.with(|mut store| instance.instance.get_export(&mut store, name)) };
    match export {
        Some(which) => {
            *item_ret = Box::into_raw(Box::new(wb_extern_t { which }));
            true
        }
        None => false,
    }
}

/// Fetch the export at `index`, in module order.
pub unsafe extern "C" fn wb_instance_export_nth(
    cx: wb_context_t,
    instance: &wb_instance_t,
    index: usize,
    name_ret: &mut wb_byte_vec_t,
    item_ret: &mut *mut wb_extern_t,
) -> bool {
    let export = unsafe {
        cx.with(|mut store| {
            instance
                .instance
                .exports(&mut store)
                .nth(index)
                .map(|export| (export.name().to_owned(), export.into_extern()))
        })
    };
    match export {
        Some((name, which)) => {
            name_ret.set_buffer(name.into_bytes());
            *item_ret = Box::into_raw(Box::new(wb_extern_t { which }));
            true
        }
        None => false,
    }
}

pub extern "C" fn wb_instance_delete(_instance: Box<wb_instance_t>) {}
