//! Host functions for wasmbridge.
//!
//! Guest modules import these functions to interact with the embedder.
//! They are ordinary bridge host functions, registered on a
//! [`wasmbridge_core::Linker`].
//!
//! # Functions
//!
//! - `env::log(level, ptr, len)`: structured logging from guest code, see
//!   [`logging`]

pub mod linker;
pub mod logging;

pub use linker::{register_all, register_logging};
pub use logging::{LogEntry, LogLevel, LogSink, LoggingHost};
