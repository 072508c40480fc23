//! PythOwOn runtime.
//!
//! The [`Vm`] executes chunks produced by `pythowon-compiler`: an explicit
//! value stack, a call-frame stack, a global table, and the object heap all
//! live here. `interpret` is the one-stop entry point the CLI and the REPL
//! drive; it compiles, runs, and reports either batch of errors.

pub mod config;
pub mod error;
pub mod natives;
pub mod vm;

pub use config::{InterpreterConfig, NativeBinding};
pub use error::{ErrorKind, InterpretError, RuntimeError};
pub use vm::{FRAMES_MAX, Vm};
