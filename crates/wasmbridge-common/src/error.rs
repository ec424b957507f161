//! Error types for wasmbridge.
//!
//! This module defines the error taxonomy using `thiserror`:
//! - [`Error`]: Everything an embedding operation can return
//! - [`Trap`]: A recoverable failure raised by or through executing wasm
//! - [`TrapCode`] and [`FrameInfo`]: Details attached to engine traps

use std::fmt;
use std::io;

use thiserror::Error;

use crate::types::ValKind;

/// Top-level embedding errors.
///
/// Traps are carried as [`Error::Trap`]; everything else is a construction,
/// linking or host-side usage error.
#[derive(Error, Debug)]
pub enum Error {
    /// A value was read as the wrong kind.
    #[error("Wrong value kind: expected {expected}, found {actual}")]
    WrongKind {
        /// The kind the accessor expected.
        expected: ValKind,
        /// The kind the value actually has.
        actual: ValKind,
    },

    /// A function was called with the wrong number of arguments.
    #[error("Wrong number of arguments: expected {expected}, got {actual}")]
    ArgumentCount {
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// A function argument has the wrong kind.
    #[error("Argument {index} has kind {actual}, expected {expected}")]
    ArgumentType {
        /// Zero-based position of the argument.
        index: usize,
        /// Declared parameter kind.
        expected: ValKind,
        /// Supplied value kind.
        actual: ValKind,
    },

    /// An instance was created with the wrong number of imports.
    #[error("Wrong number of imports: module expects {expected}, got {actual}")]
    ImportCount {
        /// Imports declared by the module.
        expected: usize,
        /// Imports supplied.
        actual: usize,
    },

    /// The linker has no definition for an import.
    #[error("Unknown import: {module}::{name}")]
    UnknownImport {
        /// Module namespace of the import.
        module: String,
        /// Field name of the import.
        name: String,
    },

    /// A linker name was defined twice while shadowing is disallowed.
    #[error("Import {module}::{name} defined twice")]
    DuplicateDefinition {
        /// Module namespace of the definition.
        module: String,
        /// Field name of the definition.
        name: String,
    },

    /// A host-side read or write fell outside a linear memory.
    #[error("Out of bounds memory access: {len} bytes at offset {offset}, memory size {size}")]
    MemoryAccess {
        /// Start of the access.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Current size of the memory in bytes.
        size: usize,
    },

    /// Execution trapped.
    #[error("Wasm trap: {0}")]
    Trap(#[from] Trap),

    /// The native engine rejected an operation.
    #[error("Engine error: {message}")]
    Engine {
        /// Message reported by the engine.
        message: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// The text format could not be translated.
    #[error("Failed to parse wat: {message}")]
    Wat {
        /// Parser diagnostic.
        message: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a new `Engine` error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a new `Wat` error.
    pub fn wat(message: impl Into<String>) -> Self {
        Self::Wat {
            message: message.into(),
        }
    }

    /// Create a new `Trap` error from a message.
    pub fn trap(message: impl Into<String>) -> Self {
        Self::Trap(Trap::new(message))
    }

    /// Returns `true` if this error is a trap.
    pub fn is_trap(&self) -> bool {
        matches!(self, Self::Trap(_))
    }

    /// Returns the trap if this error is one.
    pub fn as_trap(&self) -> Option<&Trap> {
        match self {
            Self::Trap(trap) => Some(trap),
            _ => None,
        }
    }

    /// Returns `true` if this error was caused by running out of fuel or
    /// hitting the epoch deadline.
    pub fn is_resource_limit(&self) -> bool {
        matches!(
            self.as_trap().and_then(Trap::code),
            Some(TrapCode::OutOfFuel | TrapCode::Interrupt)
        )
    }
}

/// Machine-readable cause of an engine trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapCode {
    /// The call stack was exhausted.
    StackOverflow,
    /// Out-of-bounds linear memory access.
    MemoryOutOfBounds,
    /// Misaligned atomic access.
    HeapMisaligned,
    /// Out-of-bounds table access.
    TableOutOfBounds,
    /// `call_indirect` through a null entry.
    IndirectCallToNull,
    /// `call_indirect` signature mismatch.
    BadSignature,
    /// Integer overflow.
    IntegerOverflow,
    /// Integer division by zero.
    IntegerDivisionByZero,
    /// Float to integer conversion out of range.
    BadConversionToInteger,
    /// `unreachable` executed.
    UnreachableCodeReached,
    /// Epoch deadline reached.
    Interrupt,
    /// Fuel exhausted.
    OutOfFuel,
}

impl fmt::Display for TrapCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StackOverflow => "stack overflow",
            Self::MemoryOutOfBounds => "memory out of bounds",
            Self::HeapMisaligned => "heap misaligned",
            Self::TableOutOfBounds => "table out of bounds",
            Self::IndirectCallToNull => "indirect call to null",
            Self::BadSignature => "bad signature",
            Self::IntegerOverflow => "integer overflow",
            Self::IntegerDivisionByZero => "integer division by zero",
            Self::BadConversionToInteger => "bad conversion to integer",
            Self::UnreachableCodeReached => "unreachable code reached",
            Self::Interrupt => "interrupt",
            Self::OutOfFuel => "out of fuel",
        };
        f.write_str(name)
    }
}

/// One wasm frame of a trap's backtrace, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// Index of the function in its module.
    pub func_index: u32,
    /// Name from the module's name section, if any.
    pub func_name: Option<String>,
    /// Byte offset of the trapping instruction within the function.
    pub func_offset: Option<usize>,
    /// Name of the module the function belongs to, if it has one.
    pub module_name: Option<String>,
    /// Byte offset of the trapping instruction within the module binary.
    pub module_offset: Option<usize>,
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(module) = &self.module_name {
            write!(f, "{module}!")?;
        }
        match &self.func_name {
            Some(name) => write!(f, "{name}")?,
            None => write!(f, "<wasm function {}>", self.func_index)?,
        }
        if let Some(offset) = self.func_offset {
            write!(f, " @ {offset:#x}")?;
        }
        Ok(())
    }
}

/// A recoverable failure raised by executing wasm or by a host callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Trap {
    message: String,
    code: Option<TrapCode>,
    frames: Vec<FrameInfo>,
}

impl Trap {
    /// Create a trap carrying only a message. This is how host callbacks
    /// abort the wasm that called them.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            frames: Vec::new(),
        }
    }

    /// Create a trap with every field populated.
    pub fn with_details(
        message: impl Into<String>,
        code: Option<TrapCode>,
        frames: Vec<FrameInfo>,
    ) -> Self {
        Self {
            message: message.into(),
            code,
            frames,
        }
    }

    /// The trap's message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The engine trap code, `None` for host-created traps.
    pub fn code(&self) -> Option<TrapCode> {
        self.code
    }

    /// Wasm frames active when the trap was raised.
    pub fn frames(&self) -> &[FrameInfo] {
        &self.frames
    }
}
