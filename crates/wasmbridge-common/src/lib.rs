//! Common types, errors, and configuration for wasmbridge.
//!
//! This crate provides shared functionality used across the wasmbridge workspace:
//! - Error types using `thiserror`, including the [`Trap`] value
//! - Plain-data WebAssembly type descriptors
//! - Configuration structures for engines and stores

pub mod config;
pub mod config_file;
pub mod error;
pub mod types;

pub use config::{EngineConfig, ExecutionConfig, OptLevel, RuntimeConfig, WasmFeatures};
pub use config_file::{ConfigFile, ConfigFileError, LoggingConfig};
pub use error::{Error, FrameInfo, Trap, TrapCode};
pub use types::{
    ExportType, ExternType, FuncType, GlobalType, ImportType, Limits, MemoryType, Mutability,
    TableType, ValKind,
};
