use wasmtime::Table;

use crate::{handle_result, wb_context_t, wb_error_t, wb_table_t, wb_tabletype_t, wb_val_t};

pub unsafe extern "C" fn wb_table_new(
    cx: wb_context_t,
    ty: &wb_tabletype_t,
    init: &wb_val_t,
    table_ret: &mut *mut wb_table_t,
) -> Option<Box<wb_error_t>> {
    let result = unsafe {
        cx.with(|mut store| {
            let ty = ty.to_wasmtime()?;
            let init = init.to_ref(&mut store)?;
            Table::new(&mut store, ty, init)
        })
    };
    handle_result(result, |table| {
        *table_ret = Box::into_raw(Box::new(wb_table_t::new(table)));
    })
}

pub unsafe extern "C" fn wb_table_type(cx: wb_context_t, table: &wb_table_t) -> wb_tabletype_t {
    let ty = unsafe { cx.with(|store| table.table().ty(&store)) };
    wb_tabletype_t::from_wasmtime(&ty)
}

/// Current size in elements.
pub unsafe extern "C" fn wb_table_size(cx: wb_context_t, table: &wb_table_t) -> u64 {
    unsafe { cx.with(|store| u64::from(table.table().size(&store))) }
}

/// Read one element; returns `false` if `index` is out of bounds.
pub unsafe extern "C" fn wb_table_get(
    cx: wb_context_t,
    table: &wb_table_t,
    index: u64,
    val_ret: &mut wb_val_t,
) -> bool {
    let result = unsafe {
        cx.with(|mut store| -> anyhow::Result<Option<wb_val_t>> {
            match table.table().get(&mut store, index.try_into()?) {
                Some(r) => Ok(Some(wb_val_t::from_ref(&mut store, r)?)),
                None => Ok(None),
            }
        })
    };
    match result {
        Ok(Some(val)) => {
            *val_ret = val;
            true
        }
        Ok(None) | Err(_) => false,
    }
}

pub unsafe extern "C" fn wb_table_set(
    cx: wb_context_t,
    table: &wb_table_t,
    index: u64,
    val: &wb_val_t,
) -> Option<Box<wb_error_t>> {
    let result = unsafe {
        cx.with(|mut store| {
            let val = val.to_ref(&mut store)?;
            table.table().set(&mut store, index.try_into()?, val)
        })
    };
    handle_result(result, |()| {})
}

pub unsafe extern "C" fn wb_table_grow(
    cx: wb_context_t,
    table: &wb_table_t,
    delta: u64,
    init: &wb_val_t,
    prev_size: &mut u64,
) -> Option<Box<wb_error_t>> {
    let result = unsafe {
        cx.with(|mut store| -> anyhow::Result<u64> {
            let init = init.to_ref(&mut store)?;
            let prev = table.table().grow(&mut store, delta.try_into()?, init)?;
            Ok(u64::from(prev))
        })
    };
    handle_result(result, |prev| *prev_size = prev)
}
