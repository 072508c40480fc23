//! PythOwOn command-line driver.
//!
//! `pythowon` with no arguments starts the REPL; `pythowon script.pwn`
//! runs a file. Exit codes follow the sysexits convention: 64 for usage
//! problems, 65 for compile errors, 70 for runtime errors, 74 when the
//! script cannot be read.

mod config;
mod repl;

use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use pythowon_runtime::{InterpretError, Vm};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pythowon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "PythOwOn interpreter - run a script or start the REPL", long_about = None)]
struct Cli {
    /// Script to run; starts the REPL when omitted
    script: Option<PathBuf>,

    /// Path to a pythowon.toml configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // --help and --version land here too; only real usage
            // problems get the sysexits code.
            let is_usage_error = error.use_stderr();
            let _ = error.print();
            process::exit(if is_usage_error { 64 } else { 0 });
        }
    };

    let config = config::DriverConfig::load(cli.config.as_deref());
    init_tracing(config.log.as_deref());

    match cli.script {
        Some(path) => run_file(&path),
        None => repl::run(&config),
    }
}

fn init_tracing(default_filter: Option<&str>) {
    let filter = EnvFilter::try_from_env("PYTHOWON_LOG")
        .or_else(|_| EnvFilter::try_new(default_filter.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_source(path: &Path) -> io::Result<String> {
    std::fs::read_to_string(path)
}

fn run_file(path: &Path) {
    let source = match read_source(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Could not open file \"{}\": {}.", path.display(), error);
            process::exit(74);
        }
    };

    let mut vm = Vm::new();
    match vm.interpret(&source) {
        Ok(()) => {}
        Err(InterpretError::Compile(errors)) => {
            eprintln!("{errors}");
            process::exit(65);
        }
        Err(InterpretError::Runtime(error)) => {
            eprintln!("{error}");
            process::exit(70);
        }
    }
}
