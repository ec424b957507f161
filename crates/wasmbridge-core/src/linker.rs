//! Name-based import resolution.
//!
//! A [`Linker`] maps `(module, name)` pairs to definitions and assembles
//! the positional import list [`Instance::new`] expects. Definitions are
//! store objects, so a linker serves the single store its definitions were
//! created in.

use std::collections::HashMap;

use tracing::{debug, instrument};
use wasmbridge_common::{Error, FuncType, Trap};

use crate::typed::IntoFunc;
use crate::{AsContextMut, Caller, Engine, Extern, Func, Instance, Module, Val};

/// Resolves module imports by name.
pub struct Linker {
    engine: Engine,
    defs: HashMap<(String, String), Extern>,
    allow_shadowing: bool,
}

impl Linker {
    /// Create an empty linker for modules of `engine`.
    ///
    /// Shadowing is off: defining a name twice is an error until
    /// [`Linker::allow_shadowing`] enables it.
    pub fn new(engine: &Engine) -> Self {
        Self {
            engine: engine.clone(),
            defs: HashMap::new(),
            allow_shadowing: false,
        }
    }

    /// The engine this linker was created for.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Let a later definition of a name replace the earlier one.
    pub fn allow_shadowing(&mut self, allow: bool) -> &mut Self {
        self.allow_shadowing = allow;
        self
    }

    /// Define `module::name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] if the name is already defined
    /// and shadowing is disallowed.
    pub fn define(
        &mut self,
        module: &str,
        name: &str,
        item: impl Into<Extern>,
    ) -> Result<&mut Self, Error> {
        let item = item.into();
        let key = (module.to_owned(), name.to_owned());
        if !self.allow_shadowing && self.defs.contains_key(&key) {
            return Err(Error::DuplicateDefinition { module: key.0, name: key.1 });
        }

        debug!(module, name, kind = item.kind_name(), "Defining import");
        if self.defs.insert(key, item).is_some() {
            debug!(module, name, "Shadowed previous definition");
        }
        Ok(self)
    }

    /// Define `module::name` as a host function typed by its signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the function cannot be created and the
    /// errors of [`Linker::define`].
    pub fn func_wrap<Params, Results>(
        &mut self,
        store: impl AsContextMut,
        module: &str,
        name: &str,
        func: impl IntoFunc<Params, Results>,
    ) -> Result<&mut Self, Error> {
        let func = Func::wrap(store, func)?;
        self.define(module, name, func)
    }

    /// Define `module::name` as a host function with an explicit type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the function cannot be created and the
    /// errors of [`Linker::define`].
    pub fn func_new<F>(
        &mut self,
        store: impl AsContextMut,
        module: &str,
        name: &str,
        ty: FuncType,
        func: F,
    ) -> Result<&mut Self, Error>
    where
        F: Fn(Caller<'_>, &[Val]) -> Result<Vec<Val>, Trap> + Send + Sync + 'static,
    {
        let func = Func::new(store, ty, func)?;
        self.define(module, name, func)
    }

    /// Define every export of `instance` under the module name `module`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] for the first export whose
    /// name is already taken while shadowing is disallowed.
    pub fn define_instance(
        &mut self,
        store: impl AsContextMut,
        module: &str,
        instance: &Instance,
    ) -> Result<&mut Self, Error> {
        for (name, item) in instance.exports(store) {
            self.define(module, &name, item)?;
        }
        Ok(self)
    }

    /// Instantiate `module` against this linker and define its exports
    /// under `name`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Linker::instantiate`] and
    /// [`Linker::define_instance`].
    #[instrument(skip(self, store, module))]
    pub fn define_module(
        &mut self,
        mut store: impl AsContextMut,
        name: &str,
        module: &Module,
    ) -> Result<&mut Self, Error> {
        let instance = self.instantiate(&mut store, module)?;
        self.define_instance(&mut store, name, &instance)
    }

    /// The default function of `module`: its `""` export, else `_start`,
    /// else a function that does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the default name is defined but is not a
    /// function, or if the no-op function cannot be created.
    pub fn get_default(&self, store: impl AsContextMut, module: &str) -> Result<Func, Error> {
        for name in ["", "_start"] {
            if let Some(item) = self.get(module, name) {
                return item.as_func().cloned().ok_or_else(|| {
                    Error::engine(format!(
                        "default export `{module}::{name}` is a {}, not a func",
                        item.kind_name()
                    ))
                });
            }
        }
        Func::wrap(store, || {})
    }

    /// The definition of `module::name`, if any.
    pub fn get(&self, module: &str, name: &str) -> Option<&Extern> {
        self.defs.get(&(module.to_owned(), name.to_owned()))
    }

    /// Resolve every import of `module` and instantiate it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownImport`] for the first import without a
    /// definition, and the errors of [`Instance::new`] otherwise.
    #[instrument(skip_all, fields(content_hash = %module.content_hash()))]
    pub fn instantiate(
        &self,
        store: impl AsContextMut,
        module: &Module,
    ) -> Result<Instance, Error> {
        let imports = module
            .imports()
            .into_iter()
            .map(|import| {
                self.get(&import.module, &import.name)
                    .cloned()
                    .ok_or(Error::UnknownImport {
                        module: import.module,
                        name: import.name,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Instance::new(store, module, &imports)
    }
}

impl std::fmt::Debug for Linker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linker")
            .field("definitions", &self.defs.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use wasmbridge_common::ValKind;

    const IMPORTS_WAT: &str = r#"
        (module
            (import "env" "double" (func $double (param i32) (result i32)))
            (import "env" "offset" (global $offset i32))
            (func (export "run") (param i32) (result i32)
                local.get 0
                call $double
                global.get $offset
                i32.add))
    "#;

    #[test]
    fn test_linker_instantiate() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(&engine, IMPORTS_WAT).unwrap();

        let offset = crate::Global::new(
            &mut store,
            wasmbridge_common::GlobalType::new(ValKind::I32, wasmbridge_common::Mutability::Const),
            Val::I32(100),
        )
        .unwrap();

        let mut linker = Linker::new(&engine);
        linker
            .func_wrap(&mut store, "env", "double", |x: i32| x * 2)
            .unwrap()
            .define("env", "offset", offset)
            .unwrap();

        let instance = linker.instantiate(&mut store, &module).unwrap();
        let run = instance.get_func(&mut store, "run").unwrap();
        let results = run.call(&mut store, &[Val::I32(21)]).unwrap();
        assert_eq!(results[0].i32().unwrap(), 142);
    }

    #[test]
    fn test_linker_unknown_import() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(&engine, IMPORTS_WAT).unwrap();

        let mut linker = Linker::new(&engine);
        linker
            .func_wrap(&mut store, "env", "double", |x: i32| x * 2)
            .unwrap();

        let err = linker.instantiate(&mut store, &module).unwrap_err();
        match err {
            Error::UnknownImport { module, name } => {
                assert_eq!(module, "env");
                assert_eq!(name, "offset");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_linker_shadowing() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let mut linker = Linker::new(&engine);
        linker.func_wrap(&mut store, "env", "f", || 1i32).unwrap();
        let err = linker.func_wrap(&mut store, "env", "f", || 2i32).unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition { .. }));

        linker
            .allow_shadowing(true)
            .func_wrap(&mut store, "env", "f", || 2i32)
            .unwrap();

        let f = linker.get("env", "f").and_then(Extern::as_func).unwrap().clone();
        assert_eq!(f.call(&mut store, &[]).unwrap()[0].i32().unwrap(), 2);
        assert!(linker.get("env", "g").is_none());
    }

    #[test]
    fn test_define_instance() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let provider = Module::new(
            &engine,
            r#"(module (func (export "seven") (result i32) i32.const 7))"#,
        )
        .unwrap();
        let provider = Instance::new(&mut store, &provider, &[]).unwrap();

        let consumer = Module::new(
            &engine,
            r#"(module
                (import "lib" "seven" (func $seven (result i32)))
                (func (export "run") (result i32) call $seven))"#,
        )
        .unwrap();

        let mut linker = Linker::new(&engine);
        linker.define_instance(&mut store, "lib", &provider).unwrap();
        linker.func_new(
            &mut store,
            "lib",
            "unused",
            FuncType::new([], []),
            |_, _| Ok(Vec::new()),
        )
        .unwrap();

        let instance = linker.instantiate(&mut store, &consumer).unwrap();
        let run = instance.get_func(&mut store, "run").unwrap();
        assert_eq!(run.call(&mut store, &[]).unwrap()[0].i32().unwrap(), 7);
    }
}
