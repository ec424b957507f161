//! wasmbridge CLI entry point.
//!
//! `wasmbridge run` instantiates a module with the standard host functions
//! and optionally invokes one of its exports. `wasmbridge inspect` prints a
//! module's imports and exports.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wasmbridge_common::{ConfigFile, Error, LoggingConfig, Trap, ValKind};
use wasmbridge_core::{Engine, Func, Linker, Module, Store, Val};
use wasmbridge_host::LogSink;

/// WebAssembly embedding bridge
#[derive(Parser)]
#[command(name = "wasmbridge", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Instantiate a module and optionally invoke an export
    Run(RunCommand),

    /// Print a module's imports and exports
    Inspect {
        /// Path to a `.wasm` or `.wat` module
        module: PathBuf,
    },
}

#[derive(Parser)]
struct RunCommand {
    /// Path to a `.wasm` or `.wat` module
    module: PathBuf,

    /// TOML configuration file
    #[arg(long, env = "WASMBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Export to invoke after instantiation
    #[arg(long)]
    invoke: Option<String>,

    /// Fuel available to the module; enables fuel metering
    #[arg(long)]
    fuel: Option<u64>,

    /// Arguments for the invoked export, parsed by its parameter kinds
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(run) => {
            let config = match &run.config {
                Some(path) => ConfigFile::from_file(path)?,
                None => ConfigFile::default(),
            };
            init_tracing(&config.logging);
            run.execute(config)
        }
        Command::Inspect { module } => {
            init_tracing(&LoggingConfig::default());
            inspect(&module)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the config file.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

impl RunCommand {
    fn execute(self, mut config: ConfigFile) -> Result<ExitCode> {
        if let Some(fuel) = self.fuel {
            config.runtime.engine.consume_fuel = true;
            config.runtime.execution.fuel = Some(fuel);
        }

        let engine = Engine::new(&config.runtime.engine)?;
        let mut store = Store::with_config(&engine, &config.runtime.execution)?;
        let module = Module::from_file(&engine, &self.module)
            .with_context(|| format!("failed to load `{}`", self.module.display()))?;

        let sink = LogSink::new();
        let mut linker = Linker::new(&engine);
        wasmbridge_host::register_all(&mut linker, &mut store, &sink)?;

        let instance = match linker.instantiate(&mut store, &module) {
            Ok(instance) => instance,
            Err(Error::Trap(trap)) => return Ok(report_trap(&trap)),
            Err(e) => return Err(e.into()),
        };
        info!(module = %self.module.display(), "Module instantiated");

        let Some(name) = &self.invoke else {
            return Ok(ExitCode::SUCCESS);
        };
        let Some(func) = instance.get_func(&mut store, name) else {
            bail!("module has no exported function `{name}`");
        };

        let params = self.parse_args(&mut store, &func, name)?;
        match func.call(&mut store, &params) {
            Ok(results) => {
                for result in results {
                    println!("{result}");
                }
                Ok(ExitCode::SUCCESS)
            }
            Err(Error::Trap(trap)) => Ok(report_trap(&trap)),
            Err(e) => Err(e).with_context(|| format!("failed to invoke `{name}`")),
        }
    }

    fn parse_args(&self, store: &mut Store, func: &Func, name: &str) -> Result<Vec<Val>> {
        let ty = func.ty(&mut *store);
        if self.args.len() != ty.params().len() {
            bail!(
                "`{name}` takes {} arguments, {} given",
                ty.params().len(),
                self.args.len()
            );
        }

        ty.params()
            .iter()
            .zip(&self.args)
            .map(|(kind, arg)| -> Result<Val> {
                let val = match kind {
                    ValKind::I32 => Val::I32(arg.parse()?),
                    ValKind::I64 => Val::I64(arg.parse()?),
                    ValKind::F32 => Val::from(arg.parse::<f32>()?),
                    ValKind::F64 => Val::from(arg.parse::<f64>()?),
                    other => bail!("unsupported argument type {other}"),
                };
                Ok(val)
            })
            .collect()
    }
}

fn report_trap(trap: &Trap) -> ExitCode {
    eprintln!("error: wasm trap: {}", trap.message());
    if let Some(code) = trap.code() {
        eprintln!("  code: {code:?}");
    }
    for (i, frame) in trap.frames().iter().enumerate() {
        match frame.module_offset {
            Some(offset) => eprintln!("  {i}: {frame} (module offset {offset:#x})"),
            None => eprintln!("  {i}: {frame}"),
        }
    }
    ExitCode::FAILURE
}

fn inspect(path: &Path) -> Result<()> {
    let engine = Engine::default();
    let module = Module::from_file(&engine, path)
        .with_context(|| format!("failed to load `{}`", path.display()))?;

    println!("content hash: {}", module.content_hash());
    println!("imports:");
    for import in module.imports() {
        println!("  {}::{}: {}", import.module, import.name, describe(&import.ty));
    }
    println!("exports:");
    for export in module.exports() {
        println!("  {}: {}", export.name, describe(&export.ty));
    }
    Ok(())
}

fn describe(ty: &wasmbridge_common::ExternType) -> String {
    use wasmbridge_common::ExternType;

    match ty {
        ExternType::Func(f) => format!("func {f}"),
        ExternType::Global(g) => format!("global {:?} {}", g.mutability, g.content),
        ExternType::Memory(m) => format!("memory {}..{:?}", m.limits.min, m.limits.max),
        ExternType::Table(t) => format!("table {} {}..{:?}", t.element, t.limits.min, t.limits.max),
    }
}
