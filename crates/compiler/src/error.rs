//! Compile-error collection.
//!
//! The parser never aborts on the first problem: panic mode suppresses the
//! cascade, `synchronize` skips to the next statement boundary, and every
//! surfaced error lands here. Callers get the whole batch and decide how
//! to show it.

use std::fmt;

/// Where in the token stream an error was reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// At a concrete lexeme.
    Lexeme(String),
    /// At the end of input.
    AtEnd,
    /// At a scanner error token, which carries its own message.
    Bare,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub line: u32,
    pub location: ErrorLocation,
    pub message: String,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error", self.line)?;
        match &self.location {
            ErrorLocation::Lexeme(lexeme) => write!(f, " at '{lexeme}'")?,
            ErrorLocation::AtEnd => write!(f, " at end")?,
            ErrorLocation::Bare => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Every error collected over one compilation, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}
