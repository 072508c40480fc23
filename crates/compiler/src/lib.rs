//! PythOwOn compiler.
//!
//! Source text goes in, a compiled top-level function comes out. There is
//! no AST: the Pratt parser in [`compiler`] emits bytecode as it consumes
//! tokens from the [`scanner`]. Errors are collected (panic-mode recovery
//! keeps one message per statement) and returned as a batch.

pub mod compiler;
pub mod error;
pub mod scanner;

pub use compiler::compile;
pub use error::{CompileError, CompileErrors};
pub use scanner::{Scanner, Token, TokenKind};
