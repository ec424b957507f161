//! Safe, garbage-collection-friendly embedding of a native WebAssembly engine.
//!
//! This crate wraps the `wasmbridge-sys` handle API in owned Rust types:
//! - [`Engine`] and [`Module`]: compilation, shared across stores
//! - [`Store`]: one execution context owning every runtime object
//! - [`Func`], [`Global`], [`Memory`], [`Table`], [`Instance`]: store objects
//! - [`Val`] and [`ExternRef`]: values crossing the boundary
//! - [`Linker`]: name-based import resolution
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Engine / Module                       │
//! │  (Shared, thread-safe, freed when the last clone drops) │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Store                            │
//! │  - Owns native funcs, globals, memories, tables         │
//! │  - Reclamation queue, drained at every context borrow   │
//! │  - Panic slot for host callbacks                        │
//! └─────────────────────────────────────────────────────────┘
//!            ▲                               │
//!            │ wrapper drop (any thread)     │ wasm calls host
//!            │                               ▼
//! ┌───────────────────────┐     ┌───────────────────────────┐
//! │  Func / Global / ...  │     │       Trampoline          │
//! │  Arc-shared handles   │     │  slab of host closures,   │
//! └───────────────────────┘     │  catch_unwind, finalizer  │
//!                               └───────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use wasmbridge_core::{Engine, Func, Instance, Module, Store, Val};
//!
//! let engine = Engine::default();
//! let module = Module::new(&engine, r#"
//!     (module
//!         (import "" "hello" (func $hello (param i32) (result i32)))
//!         (func (export "run") (result i32) i32.const 41 call $hello))
//! "#)?;
//!
//! let mut store = Store::new(&engine);
//! let hello = Func::wrap(&mut store, |x: i32| x + 1)?;
//! let instance = Instance::new(&mut store, &module, &[hello.into()])?;
//! let run = instance.get_func(&mut store, "run").unwrap();
//! assert_eq!(run.call(&mut store, &[])?[0].i32()?, 42);
//! ```

pub mod engine;
pub mod r#extern;
pub mod func;
pub mod global;
pub mod instance;
pub mod linker;
pub mod memory;
pub mod module;
pub mod store;
pub mod table;
pub mod typed;
pub mod val;

mod freelist;
mod handle;
mod native;
mod slab;
mod trampoline;

pub use engine::Engine;
pub use r#extern::Extern;
pub use func::{Caller, Func};
pub use global::Global;
pub use instance::Instance;
pub use linker::Linker;
pub use memory::{Memory, PAGE_SIZE};
pub use module::{Module, wat2wasm};
pub use store::{AsContextMut, Store, StoreContextMut};
pub use table::Table;
pub use typed::{IntoFunc, WasmResults, WasmTy};
pub use val::{ExternRef, Val};

pub use wasmbridge_common::{
    EngineConfig, Error, ExecutionConfig, ExportType, ExternType, FrameInfo, FuncType,
    GlobalType, ImportType, Limits, MemoryType, Mutability, OptLevel, TableType, Trap, TrapCode,
    ValKind,
};
