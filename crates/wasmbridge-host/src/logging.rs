//! Logging host function implementation.
//!
//! Guest modules emit log lines through `env.log`. Each line is both kept in
//! a [`LogSink`] for later retrieval and emitted via `tracing`.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

/// Severity of a guest log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// A single line logged by a guest.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: Instant,
}

/// Shared collector for guest log lines.
///
/// Clones share the same buffer, so one clone can be moved into a host
/// function while another stays with the embedder.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every entry logged so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Remove and return every entry logged so far.
    pub fn take(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn push(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}

/// Host implementation for the logging interface.
pub struct LoggingHost;

impl LoggingHost {
    /// Record `message` in `sink` and emit it via `tracing`.
    pub fn log(sink: &LogSink, level: LogLevel, message: &str) {
        sink.push(LogEntry {
            level,
            message: message.to_string(),
            timestamp: Instant::now(),
        });

        match level {
            LogLevel::Debug => debug!(guest_log = true, "{}", message),
            LogLevel::Info => info!(guest_log = true, "{}", message),
            LogLevel::Warn => warn!(guest_log = true, "{}", message),
            LogLevel::Error => error!(guest_log = true, "{}", message),
        }
    }
}

/// Convert a numeric log level to [`LogLevel`].
///
/// 0=debug, 1=info, 2=warn, 3=error. Unknown values map to info.
pub fn level_from_i32(level: i32) -> LogLevel {
    match level {
        0 => LogLevel::Debug,
        2 => LogLevel::Warn,
        3 => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level_to_i32(level: LogLevel) -> i32 {
        match level {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Warn => 2,
            LogLevel::Error => 3,
        }
    }

    #[test]
    fn test_logging_stores_in_sink() {
        let sink = LogSink::new();

        LoggingHost::log(&sink, LogLevel::Info, "Hello");
        LoggingHost::log(&sink, LogLevel::Error, "World");

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "Hello");
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[1].message, "World");
        assert_eq!(entries[1].level, LogLevel::Error);
    }

    #[test]
    fn test_sink_clones_share_entries() {
        let sink = LogSink::new();
        let other = sink.clone();

        LoggingHost::log(&other, LogLevel::Warn, "shared");
        assert_eq!(sink.len(), 1);

        let taken = sink.take();
        assert_eq!(taken[0].message, "shared");
        assert!(other.is_empty());
    }

    #[test]
    fn test_level_from_i32() {
        assert_eq!(level_from_i32(0), LogLevel::Debug);
        assert_eq!(level_from_i32(1), LogLevel::Info);
        assert_eq!(level_from_i32(2), LogLevel::Warn);
        assert_eq!(level_from_i32(3), LogLevel::Error);
        assert_eq!(level_from_i32(99), LogLevel::Info);
    }

    #[test]
    fn test_level_round_trip() {
        for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            assert_eq!(level_from_i32(level_to_i32(level)), level);
        }
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }
}
