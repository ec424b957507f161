//! Host function registration on a [`Linker`].

use tracing::warn;
use wasmbridge_common::Error;
use wasmbridge_core::{AsContextMut, Caller, Extern, Linker};

use crate::logging::{LogSink, LoggingHost, level_from_i32};

/// Register every standard host function on `linker`.
///
/// This registers:
/// - `env::log`: logging for guest code, collected into `sink`
///
/// # Errors
///
/// Returns an error if function registration fails.
pub fn register_all(
    linker: &mut Linker,
    store: impl AsContextMut,
    sink: &LogSink,
) -> Result<(), Error> {
    register_logging(linker, store, sink)?;
    Ok(())
}

/// Register `env::log(level: i32, ptr: i32, len: i32)`.
///
/// # Memory Protocol
///
/// The guest passes:
/// - `level`: Log level (0=debug, 1=info, 2=warn, 3=error)
/// - `ptr`: Offset of the message in the guest's exported `memory`
/// - `len`: Length of the message in bytes (UTF-8)
///
/// Bad input from the guest is logged and ignored rather than trapping.
pub fn register_logging(
    linker: &mut Linker,
    store: impl AsContextMut,
    sink: &LogSink,
) -> Result<(), Error> {
    let sink = sink.clone();
    linker.func_wrap(
        store,
        "env",
        "log",
        move |mut caller: Caller<'_>, level: i32, ptr: i32, len: i32| {
            let (Ok(offset), Ok(len)) = (usize::try_from(ptr), usize::try_from(len)) else {
                warn!(ptr, len, "Invalid pointer or length (negative value)");
                return;
            };

            let Some(memory) = caller.get_export("memory").and_then(Extern::into_memory) else {
                warn!("Memory export not found in guest module");
                return;
            };

            // Bounds are checked against the live data view before anything
            // is copied out of it.
            let message = memory.with_data(&mut caller, |data| {
                let Some(end) = offset.checked_add(len) else {
                    warn!(ptr, len, "Pointer + length overflow");
                    return None;
                };
                let Some(bytes) = data.get(offset..end) else {
                    warn!(
                        start = offset,
                        end,
                        memory_size = data.len(),
                        "Memory access out of bounds"
                    );
                    return None;
                };
                Some(
                    std::str::from_utf8(bytes)
                        .unwrap_or("<invalid utf8>")
                        .to_string(),
                )
            });
            let Some(message) = message else {
                return;
            };

            LoggingHost::log(&sink, level_from_i32(level), &message);
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use wasmbridge_core::{Engine, Module, Store, Val};

    const GUEST_WAT: &str = r#"
        (module
            (import "env" "log" (func $log (param i32 i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "hello from wasm")
            (data (i32.const 32) "\ff\fe")
            (func (export "run")
                i32.const 1
                i32.const 0
                i32.const 15
                call $log
                i32.const 3
                i32.const 6
                i32.const 4
                call $log)
            (func (export "bad") (param i32 i32)
                i32.const 2
                local.get 0
                local.get 1
                call $log)
        )
    "#;

    fn guest(sink: &LogSink) -> (Store, wasmbridge_core::Instance) {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(&engine, GUEST_WAT).unwrap();

        let mut linker = Linker::new(&engine);
        register_all(&mut linker, &mut store, sink).unwrap();
        let instance = linker.instantiate(&mut store, &module).unwrap();
        (store, instance)
    }

    #[test]
    fn test_register_logging() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let mut linker = Linker::new(&engine);

        register_logging(&mut linker, &mut store, &LogSink::new()).unwrap();
        let log = linker.get("env", "log").and_then(Extern::as_func).unwrap();
        assert_eq!(log.ty(&mut store).to_string(), "(i32, i32, i32) -> ()");
    }

    #[test]
    fn test_register_all() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let mut linker = Linker::new(&engine);

        assert!(register_all(&mut linker, &mut store, &LogSink::new()).is_ok());
        assert!(linker.get("env", "log").is_some());
    }

    #[test]
    fn test_guest_log_end_to_end() {
        let sink = LogSink::new();
        let (mut store, instance) = guest(&sink);

        let run = instance.get_func(&mut store, "run").unwrap();
        run.call(&mut store, &[]).unwrap();

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].message, "hello from wasm");
        assert_eq!(entries[1].level, LogLevel::Error);
        assert_eq!(entries[1].message, "from");
    }

    #[test]
    fn test_guest_log_bad_input_is_ignored() {
        let sink = LogSink::new();
        let (mut store, instance) = guest(&sink);
        let bad = instance.get_func(&mut store, "bad").unwrap();

        // Negative length, then a range past the end of memory.
        bad.call(&mut store, &[Val::I32(0), Val::I32(-1)]).unwrap();
        bad.call(&mut store, &[Val::I32(65_530), Val::I32(16)]).unwrap();
        assert!(sink.is_empty());

        bad.call(&mut store, &[Val::I32(32), Val::I32(2)]).unwrap();
        let entries = sink.take();
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].message, "<invalid utf8>");
    }

    #[test]
    fn test_guest_without_memory() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let module = Module::new(
            &engine,
            r#"(module
                (import "env" "log" (func $log (param i32 i32 i32)))
                (func (export "run")
                    i32.const 1
                    i32.const 0
                    i32.const 4
                    call $log))"#,
        )
        .unwrap();

        let sink = LogSink::new();
        let mut linker = Linker::new(&engine);
        register_logging(&mut linker, &mut store, &sink).unwrap();
        let instance = linker.instantiate(&mut store, &module).unwrap();

        let run = instance.get_func(&mut store, "run").unwrap();
        run.call(&mut store, &[]).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_guest_log_huge_length_is_rejected() {
        let sink = LogSink::new();
        let (mut store, instance) = guest(&sink);
        let bad = instance.get_func(&mut store, "bad").unwrap();

        // Repeated calls with a length near 2 GiB against a 64 KiB memory.
        for _ in 0..64 {
            bad.call(&mut store, &[Val::I32(0), Val::I32(i32::MAX)]).unwrap();
        }
        bad.call(&mut store, &[Val::I32(i32::MAX), Val::I32(i32::MAX)])
            .unwrap();
        assert!(sink.is_empty());

        // Still logs normally afterwards.
        bad.call(&mut store, &[Val::I32(0), Val::I32(5)]).unwrap();
        assert_eq!(sink.take()[0].message, "hello");
    }
}
