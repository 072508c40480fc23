//! Runtime error values.
//!
//! A runtime fault carries a kind tag, a formatted message, and the call
//! trace captured at the point of failure. The VM resets itself after
//! building one of these; recovery is always whole-`interpret` recovery.

use std::fmt;

use pythowon_compiler::CompileErrors;

/// Classification prefix for a runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong operand or value type, or an undefined variable.
    Value,
    /// Call-site argument count mismatch.
    Argument,
    /// Call-frame exhaustion.
    Frame,
    /// Calling something that is not callable.
    Call,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Value => "ValueError",
            ErrorKind::Argument => "ArgumentError",
            ErrorKind::Frame => "FrameError",
            ErrorKind::Call => "CallError",
        }
    }
}

/// One frame of the captured call trace, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub line: u32,
    /// Function name; `None` is the top-level script.
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub trace: Vec<TraceFrame>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        for frame in &self.trace {
            write!(f, "\n[line {}] in ", frame.line)?;
            match &frame.name {
                Some(name) => write!(f, "{name}()")?,
                None => write!(f, "script")?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

/// Outcome of a failed `interpret` call: the CLI maps these to exit codes
/// 65 and 70 respectively.
#[derive(Debug)]
pub enum InterpretError {
    Compile(CompileErrors),
    Runtime(RuntimeError),
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpretError::Compile(errors) => write!(f, "{errors}"),
            InterpretError::Runtime(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for InterpretError {}

impl From<CompileErrors> for InterpretError {
    fn from(errors: CompileErrors) -> Self {
        InterpretError::Compile(errors)
    }
}

impl From<RuntimeError> for InterpretError {
    fn from(error: RuntimeError) -> Self {
        InterpretError::Runtime(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_kind_message_and_trace() {
        let error = RuntimeError {
            kind: ErrorKind::Value,
            message: "Undefined variable 'undef'.".to_string(),
            trace: vec![
                TraceFrame {
                    line: 4,
                    name: Some("inner".to_string()),
                },
                TraceFrame { line: 9, name: None },
            ],
        };
        assert_eq!(
            error.to_string(),
            "ValueError: Undefined variable 'undef'.\n[line 4] in inner()\n[line 9] in script"
        );
    }

    #[test]
    fn kind_prefixes() {
        assert_eq!(ErrorKind::Value.as_str(), "ValueError");
        assert_eq!(ErrorKind::Argument.as_str(), "ArgumentError");
        assert_eq!(ErrorKind::Frame.as_str(), "FrameError");
        assert_eq!(ErrorKind::Call.as_str(), "CallError");
    }
}
