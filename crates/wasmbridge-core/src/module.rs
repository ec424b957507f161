//! WebAssembly module compilation.
//!
//! This module provides [`Module`], a compiled module owned by its engine,
//! and [`wat2wasm`] for translating the text format.
//!
//! # Sources
//!
//! - **Binary**: `\0asm` bytes, compiled directly
//! - **Text**: WAT source, translated with the `wat` crate first
//! - **Serialized**: bytes from [`Module::serialize`], loaded without
//!   recompiling
//!
//! A module is not tied to any store. It can be instantiated in every store
//! of its engine and is freed directly when the last clone drops.

#![allow(unsafe_code)]

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};
use wasmbridge_common::{Error, ExportType, ImportType};
use wasmbridge_sys::{
    wb_byte_vec_t, wb_module_delete, wb_module_deserialize, wb_module_export_nth,
    wb_module_exports_len, wb_module_import_nth, wb_module_imports_len, wb_module_new,
    wb_module_serialize, wb_module_t, wb_module_validate,
};

use crate::Engine;
use crate::native::{error_from_native, exporttype_from_native, importtype_from_native};

/// A compiled WebAssembly module.
///
/// Cloning is cheap; every clone shares the compiled code.
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

struct ModuleInner {
    raw: NonNull<wb_module_t>,
    engine: Engine,
    content_hash: String,
}

// Compiled modules are immutable and engine-owned.
unsafe impl Send for ModuleInner {}
unsafe impl Sync for ModuleInner {}

impl Drop for ModuleInner {
    fn drop(&mut self) {
        wb_module_delete(unsafe { Box::from_raw(self.raw.as_ptr()) });
    }
}

impl Module {
    /// Compile a module from binary or text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wat`] if text cannot be parsed and [`Error::Engine`]
    /// if the engine rejects the module.
    #[instrument(skip_all, fields(bytes_len = bytes.as_ref().len()))]
    pub fn new(engine: &Engine, bytes: impl AsRef<[u8]>) -> Result<Self, Error> {
        let binary = wat::parse_bytes(bytes.as_ref()).map_err(|e| Error::wat(e.to_string()))?;
        Self::compile(engine, &binary, "Module compiled")
    }

    /// Compile a module from the binary format only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the bytes are not a valid module.
    #[instrument(skip_all, fields(bytes_len = binary.len()))]
    pub fn from_binary(engine: &Engine, binary: &[u8]) -> Result<Self, Error> {
        Self::compile(engine, binary, "Binary module compiled")
    }

    /// Compile a module from WAT source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wat`] if the source does not parse and
    /// [`Error::Engine`] if the result does not compile.
    #[instrument(skip_all)]
    pub fn from_wat(engine: &Engine, wat: &str) -> Result<Self, Error> {
        let binary = wat2wasm(wat)?;
        Self::compile(engine, &binary, "WAT module compiled")
    }

    /// Compile a module from a file.
    ///
    /// A file starting with a zero byte is read as binary; anything else is
    /// read as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, and the errors of
    /// [`Module::from_binary`] or [`Module::from_wat`] otherwise.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_file(engine: &Engine, path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = std::fs::read(path.as_ref())?;
        if bytes.first() == Some(&0) {
            Self::from_binary(engine, &bytes)
        } else {
            let text = std::str::from_utf8(&bytes).map_err(|e| Error::wat(e.to_string()))?;
            Self::from_wat(engine, text)
        }
    }

    /// Check that `bytes` form a valid module for `engine`, without
    /// compiling it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] describing the first validation failure.
    pub fn validate(engine: &Engine, bytes: impl AsRef<[u8]>) -> Result<(), Error> {
        let binary = wat::parse_bytes(bytes.as_ref()).map_err(|e| Error::wat(e.to_string()))?;
        match unsafe { wb_module_validate(engine.native(), binary.as_ptr(), binary.len()) } {
            Some(error) => Err(error_from_native(error)),
            None => Ok(()),
        }
    }

    /// Load a module produced by [`Module::serialize`].
    ///
    /// # Safety
    ///
    /// The bytes are trusted machine code. Only load artifacts serialized
    /// by a compatible engine that you produced yourself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the artifact is incompatible.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub unsafe fn deserialize(engine: &Engine, bytes: &[u8]) -> Result<Self, Error> {
        let start = Instant::now();
        let mut raw = ptr::null_mut();
        let result = unsafe {
            wb_module_deserialize(engine.native(), bytes.as_ptr(), bytes.len(), &mut raw)
        };
        if let Some(error) = result {
            return Err(error_from_native(error));
        }

        let module = Self::from_raw(raw, engine, compute_hash(bytes))?;
        debug!(
            content_hash = %module.content_hash(),
            duration_us = start.elapsed().as_micros(),
            "Serialized module loaded"
        );
        Ok(module)
    }

    /// Serialize the compiled code for later [`Module::deserialize`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        let mut buf = wb_byte_vec_t::empty();
        match wb_module_serialize(self.native(), &mut buf) {
            Some(error) => Err(error_from_native(error)),
            None => Ok(buf.take()),
        }
    }

    /// The module's imports, in declaration order.
    ///
    /// Imports of kinds the host cannot represent are skipped.
    pub fn imports(&self) -> Vec<ImportType> {
        let raw = self.native();
        (0..wb_module_imports_len(raw))
            .filter_map(|i| wb_module_import_nth(raw, i))
            .filter_map(importtype_from_native)
            .collect()
    }

    /// The module's exports, in declaration order.
    pub fn exports(&self) -> Vec<ExportType> {
        let raw = self.native();
        (0..wb_module_exports_len(raw))
            .filter_map(|i| wb_module_export_nth(raw, i))
            .filter_map(exporttype_from_native)
            .collect()
    }

    /// Number of imports an instance must be given, including any the
    /// host cannot represent.
    pub(crate) fn import_count(&self) -> usize {
        wb_module_imports_len(self.native())
    }

    /// The engine this module was compiled for.
    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// Hash of the bytes the module was built from.
    pub fn content_hash(&self) -> &str {
        &self.inner.content_hash
    }

    pub(crate) fn native(&self) -> &wb_module_t {
        unsafe { self.inner.raw.as_ref() }
    }

    fn compile(engine: &Engine, binary: &[u8], what: &'static str) -> Result<Self, Error> {
        let start = Instant::now();
        let mut raw = ptr::null_mut();
        let result =
            unsafe { wb_module_new(engine.native(), binary.as_ptr(), binary.len(), &mut raw) };
        if let Some(error) = result {
            return Err(error_from_native(error));
        }

        let module = Self::from_raw(raw, engine, compute_hash(binary))?;
        info!(
            content_hash = %module.content_hash(),
            duration_ms = start.elapsed().as_millis(),
            imports = module.import_count(),
            "{what}"
        );
        Ok(module)
    }

    fn from_raw(
        raw: *mut wb_module_t,
        engine: &Engine,
        content_hash: String,
    ) -> Result<Self, Error> {
        let raw = NonNull::new(raw).ok_or_else(|| Error::engine("engine returned no module"))?;
        Ok(Self {
            inner: Arc::new(ModuleInner {
                raw,
                engine: engine.clone(),
                content_hash,
            }),
        })
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("content_hash", &self.inner.content_hash)
            .finish_non_exhaustive()
    }
}

/// Translate WAT source into the binary format.
///
/// Input that already is a binary module is returned unchanged.
///
/// # Errors
///
/// Returns [`Error::Wat`] with the parser's diagnostic.
pub fn wat2wasm(wat: &str) -> Result<Vec<u8>, Error> {
    match wat::parse_str(wat) {
        Ok(binary) => Ok(binary),
        Err(e) => Err(Error::wat(e.to_string())),
    }
}

fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmbridge_common::{ExternType, FuncType, ValKind};

    // Minimal valid Wasm module (empty module)
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    const ADD_WAT: &str = r#"
        (module
            (import "env" "log" (func $log (param i32 i32)))
            (memory (export "memory") 1)
            (func (export "add") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add))
    "#;

    #[test]
    fn test_compute_hash() {
        let hash1 = compute_hash(b"hello");
        let hash2 = compute_hash(b"hello");
        let hash3 = compute_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16);
    }

    #[test]
    fn test_module_from_binary() {
        let engine = Engine::default();
        let module = Module::from_binary(&engine, MINIMAL_WASM).unwrap();

        assert!(module.imports().is_empty());
        assert!(module.exports().is_empty());
        assert!(Engine::same(module.engine(), &engine));
    }

    #[test]
    fn test_module_rejects_garbage() {
        let engine = Engine::default();

        let err = Module::from_binary(&engine, &[0x00, 0x61]).unwrap_err();
        assert!(matches!(err, Error::Engine { .. }));

        let err = Module::from_wat(&engine, "(module (func").unwrap_err();
        assert!(matches!(err, Error::Wat { .. }));
    }

    #[test]
    fn test_module_imports_exports() {
        let engine = Engine::default();
        let module = Module::new(&engine, ADD_WAT).unwrap();

        let imports = module.imports();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].module, "env");
        assert_eq!(imports[0].name, "log");
        assert_eq!(
            imports[0].ty,
            ExternType::Func(FuncType::new([ValKind::I32, ValKind::I32], []))
        );

        let exports = module.exports();
        let names: Vec<_> = exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["memory", "add"]);
        assert_eq!(exports[0].ty.kind_name(), "memory");
    }

    #[test]
    fn test_validate() {
        let engine = Engine::default();
        assert!(Module::validate(&engine, MINIMAL_WASM).is_ok());
        assert!(Module::validate(&engine, ADD_WAT).is_ok());

        let invalid = "(module (func (result i32)))";
        assert!(matches!(
            Module::validate(&engine, invalid),
            Err(Error::Engine { .. })
        ));
    }

    #[test]
    fn test_serialize_round_trip() {
        let engine = Engine::default();
        let module = Module::new(&engine, ADD_WAT).unwrap();

        let bytes = module.serialize().unwrap();
        let loaded = unsafe { Module::deserialize(&engine, &bytes) }.unwrap();
        assert_eq!(loaded.exports(), module.exports());
    }

    #[test]
    fn test_from_file_detects_format() {
        let engine = Engine::default();
        let dir = std::env::temp_dir().join(format!("wasmbridge-module-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let text = dir.join("add.wat");
        std::fs::write(&text, ADD_WAT).unwrap();
        assert_eq!(Module::from_file(&engine, &text).unwrap().exports().len(), 2);

        let binary = dir.join("empty.wasm");
        std::fs::write(&binary, MINIMAL_WASM).unwrap();
        assert!(Module::from_file(&engine, &binary).unwrap().exports().is_empty());

        let missing = dir.join("missing.wasm");
        assert!(matches!(Module::from_file(&engine, &missing), Err(Error::Io(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_wat2wasm() {
        let binary = wat2wasm("(module)").unwrap();
        assert!(binary.starts_with(b"\0asm"));
        assert_eq!(binary, MINIMAL_WASM);

        assert!(matches!(wat2wasm("(module"), Err(Error::Wat { .. })));
    }

    #[test]
    fn test_module_debug() {
        let engine = Engine::default();
        let module = Module::from_binary(&engine, MINIMAL_WASM).unwrap();

        let debug_str = format!("{module:?}");
        assert!(debug_str.contains("Module"));
        assert!(debug_str.contains("content_hash"));
    }
}
