//! Interpreter configuration.
//!
//! Lets an embedding host extend the VM without touching it: extra native
//! functions are registered at construction time next to the built-in ones,
//! and the call-depth cap can be tightened for sandboxed use.

use pythowon_core::object::NativeFn;

use crate::vm::FRAMES_MAX;

/// A host function to expose as a global.
#[derive(Clone)]
pub struct NativeBinding {
    /// The global name scripts call it by.
    pub name: String,
    pub function: NativeFn,
}

impl NativeBinding {
    pub fn new(name: impl Into<String>, function: NativeFn) -> Self {
        NativeBinding {
            name: name.into(),
            function,
        }
    }
}

impl std::fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBinding")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Builder-style configuration for [`Vm`](crate::Vm) construction.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    pub natives: Vec<NativeBinding>,
    /// Maximum call depth before a `FrameError: StackOverflow.`.
    pub frames_max: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            natives: Vec::new(),
            frames_max: FRAMES_MAX,
        }
    }
}

impl InterpreterConfig {
    pub fn new() -> Self {
        InterpreterConfig::default()
    }

    /// Register an extra native function (builder pattern).
    pub fn with_native(mut self, binding: NativeBinding) -> Self {
        self.natives.push(binding);
        self
    }

    pub fn with_natives(mut self, bindings: impl IntoIterator<Item = NativeBinding>) -> Self {
        self.natives.extend(bindings);
        self
    }

    pub fn with_frames_max(mut self, frames_max: usize) -> Self {
        self.frames_max = frames_max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pythowon_core::value::Value;

    fn answer(_args: &[Value]) -> Value {
        Value::Int(42)
    }

    #[test]
    fn builder_accumulates_natives() {
        let config = InterpreterConfig::new()
            .with_native(NativeBinding::new("answer", answer))
            .with_native(NativeBinding::new("answer2", answer));
        assert_eq!(config.natives.len(), 2);
        assert_eq!(config.natives[0].name, "answer");
    }

    #[test]
    fn frames_cap_defaults_to_vm_limit() {
        assert_eq!(InterpreterConfig::default().frames_max, FRAMES_MAX);
        assert_eq!(
            InterpreterConfig::new().with_frames_max(16).frames_max,
            16
        );
    }
}
