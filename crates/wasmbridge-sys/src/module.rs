use tracing::debug;
use wasmtime::Module;

use crate::{
    handle_result, slice_from_raw_parts, wb_byte_vec_t, wb_engine_t, wb_error_t,
    wb_exporttype_t, wb_externtype_t, wb_importtype_t,
};

/// A compiled module. Owned by its engine, usable with any store of it.
pub struct wb_module_t {
    pub(crate) module: Module,
    imports: Vec<wb_importtype_t>,
    exports: Vec<wb_exporttype_t>,
}

impl wb_module_t {
    fn new(module: Module) -> anyhow::Result<Self> {
        let imports = module
            .imports()
            .map(|i| {
                Ok(wb_importtype_t {
                    module: i.module().to_owned(),
                    name: i.name().to_owned(),
                    ty: wb_externtype_t::from_wasmtime(&i.ty())?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let exports = module
            .exports()
            .map(|e| {
                Ok(wb_exporttype_t {
                    name: e.name().to_owned(),
                    ty: wb_externtype_t::from_wasmtime(&e.ty())?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        debug!(
            imports = imports.len(),
            exports = exports.len(),
            "native module ready"
        );
        Ok(Self {
            module,
            imports,
            exports,
        })
    }
}

pub unsafe extern "C" fn wb_module_new(
    engine: &wb_engine_t,
    wasm: *const u8,
    len: usize,
    module_ret: &mut *mut wb_module_t,
) -> Option<Box<wb_error_t>> {
    let binary = unsafe { slice_from_raw_parts(wasm, len) };
    let result = Module::new(&engine.engine, binary).and_then(wb_module_t::new);
    handle_result(result, |module| *module_ret = Box::into_raw(Box::new(module)))
}

pub unsafe extern "C" fn wb_module_validate(
    engine: &wb_engine_t,
    wasm: *const u8,
    len: usize,
) -> Option<Box<wb_error_t>> {
    let binary = unsafe { slice_from_raw_parts(wasm, len) };
    handle_result(Module::validate(&engine.engine, binary), |()| {})
}

pub extern "C" fn wb_module_imports_len(module: &wb_module_t) -> usize {
    module.imports.len()
}

pub extern "C" fn wb_module_import_nth(module: &wb_module_t, index: usize) -> Option<&wb_importtype_t> {
    module.imports.get(index)
}

pub extern "C" fn wb_module_exports_len(module: &wb_module_t) -> usize {
    module.exports.len()
}

pub extern "C" fn wb_module_export_nth(module: &wb_module_t, index: usize) -> Option<&wb_exporttype_t> {
    module.exports.get(index)
}

pub extern "C" fn wb_module_serialize(
    module: &wb_module_t,
    ret: &mut wb_byte_vec_t,
) -> Option<Box<wb_error_t>> {
    handle_result(module.module.serialize(), |buffer| ret.set_buffer(buffer))
}

/// # Safety
///
/// `bytes` must come from `wb_module_serialize` on a compatible engine.
pub unsafe extern "C" fn wb_module_deserialize(
    engine: &wb_engine_t,
    bytes: *const u8,
    len: usize,
    module_ret: &mut *mut wb_module_t,
) -> Option<Box<wb_error_t>> {
    let bytes = unsafe { slice_from_raw_parts(bytes, len) };
    let result = unsafe { Module::deserialize(&engine.engine, bytes) }.and_then(wb_module_t::new);
    handle_result(result, |module| *module_ret = Box::into_raw(Box::new(module)))
}

pub extern "C" fn wb_module_delete(_module: Box<wb_module_t>) {}
