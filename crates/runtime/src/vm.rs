//! The bytecode virtual machine.
//!
//! A straight fetch-decode-execute loop over the current call frame. The
//! running frame is kept in a local; only suspended callers sit in the
//! frame stack, so dispatch never re-indexes the frame array. The value
//! stack is shared by every frame: a frame's window starts at the slot
//! holding the callee, so slot 0 is the function itself and argument N is
//! at slot N.
//!
//! Runtime faults reset the machine (stack and frames cleared) and carry a
//! call trace; the heap and the global table survive, which is what lets a
//! REPL keep its definitions after an error.

use std::io::{self, Write};

use pythowon_core::chunk::OpCode;
use pythowon_core::object::{Function, Heap, NativeFn, ObjRef, Object};
use pythowon_core::table::Table;
use pythowon_core::value::{Value, is_falsey};
use pythowon_compiler::compile;

use crate::config::InterpreterConfig;
use crate::error::{ErrorKind, InterpretError, RuntimeError, TraceFrame};
use crate::natives;

/// Maximum call depth.
pub const FRAMES_MAX: usize = 255;

/// Activation record: which function, where in its code, and where its
/// slot window begins on the shared value stack.
#[derive(Debug, Clone, Copy)]
struct CallFrame {
    function: ObjRef,
    ip: usize,
    base: usize,
}

enum Callee {
    Function {
        object: ObjRef,
        arity: usize,
        def_arity: usize,
        default_start: usize,
    },
    Native(NativeFn),
    NotCallable,
}

pub struct Vm {
    stack: Vec<Value>,
    /// Suspended callers; the running frame lives in `run`.
    frames: Vec<CallFrame>,
    globals: Table,
    heap: Heap,
    frames_max: usize,
    out: Box<dyn Write>,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        natives::mark_start();
        let mut vm = Vm {
            stack: Vec::new(),
            frames: Vec::new(),
            globals: Table::new(),
            heap: Heap::new(),
            frames_max: config.frames_max,
            out: Box::new(io::stdout()),
        };
        vm.define_native("clock", natives::clock);
        for binding in &config.natives {
            vm.define_native(&binding.name, binding.function);
        }
        vm
    }

    /// Redirect the `print` sink (stdout by default).
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    fn define_native(&mut self, name: &str, function: NativeFn) {
        let name = self.heap.copy_string(name);
        let native = self.heap.alloc_native(function);
        self.globals
            .set(self.heap.objects(), Value::Obj(name), Value::Obj(native));
    }

    /// Compile and execute one source unit to completion.
    ///
    /// Globals, interned strings, and heap objects persist across calls;
    /// the value stack is empty on entry and on every exit path.
    pub fn interpret(&mut self, source: &str) -> Result<(), InterpretError> {
        let function = compile(source, &mut self.heap)?;
        self.stack.push(Value::Obj(function));
        let frame = CallFrame {
            function,
            ip: 0,
            base: 0,
        };
        self.run(frame).map_err(InterpretError::from)
    }

    // ----- decoding -------------------------------------------------------

    fn function(&self, r: ObjRef) -> &Function {
        match self.heap.object(r) {
            Object::Function(f) => f,
            _ => unreachable!("call frame must reference a function"),
        }
    }

    fn read_byte(&self, frame: &mut CallFrame) -> u8 {
        let byte = self.function(frame.function).chunk.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&self, frame: &mut CallFrame) -> u16 {
        let high = self.read_byte(frame);
        let low = self.read_byte(frame);
        u16::from_be_bytes([high, low])
    }

    fn read_u32(&self, frame: &mut CallFrame) -> u32 {
        let mut bytes = [0u8; 4];
        for byte in &mut bytes {
            *byte = self.read_byte(frame);
        }
        u32::from_be_bytes(bytes)
    }

    fn constant(&self, frame: &CallFrame, index: usize) -> Value {
        self.function(frame.function).chunk.constants[index]
    }

    // ----- stack ----------------------------------------------------------

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("value stack underflow")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn is_string(&self, value: Value) -> bool {
        matches!(value, Value::Obj(r) if matches!(self.heap.object(r), Object::Str(_)))
    }

    fn as_chars(&self, value: Value) -> Option<&str> {
        match value {
            Value::Obj(r) => match self.heap.object(r) {
                Object::Str(s) => Some(&s.chars),
                _ => None,
            },
            _ => None,
        }
    }

    // ----- faults ---------------------------------------------------------

    /// Build a runtime error with the current call trace, then reset the
    /// machine. Innermost frame first.
    fn fault(&mut self, frame: &CallFrame, kind: ErrorKind, message: String) -> RuntimeError {
        let mut trace = Vec::with_capacity(self.frames.len() + 1);
        for f in std::iter::once(frame).chain(self.frames.iter().rev()) {
            let function = self.function(f.function);
            let line = function
                .chunk
                .lines
                .get(f.ip.saturating_sub(1))
                .copied()
                .unwrap_or(0);
            let name = function
                .name
                .and_then(|n| self.heap.as_str(n))
                .map(|s| s.chars.clone());
            trace.push(TraceFrame { line, name });
        }
        tracing::debug!(kind = kind.as_str(), %message, "runtime error");
        self.stack.clear();
        self.frames.clear();
        RuntimeError {
            kind,
            message,
            trace,
        }
    }

    // ----- operators ------------------------------------------------------

    fn comparison(&mut self, frame: &CallFrame, op: OpCode) -> Result<(), RuntimeError> {
        match (self.peek(1).as_f64(), self.peek(0).as_f64()) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                let result = match op {
                    OpCode::Greater => a > b,
                    _ => a < b,
                };
                self.stack.push(Value::Bool(result));
                Ok(())
            }
            _ => Err(self.fault(
                frame,
                ErrorKind::Value,
                "Operands must be numbers.".to_string(),
            )),
        }
    }

    fn add(&mut self, frame: &CallFrame) -> Result<(), RuntimeError> {
        let b = self.peek(0);
        let a = self.peek(1);
        if self.is_string(a) || self.is_string(b) {
            self.pop();
            self.pop();
            let text = format!("{}{}", self.heap.render(a), self.heap.render(b));
            let result = self.heap.take_string(text);
            self.stack.push(Value::Obj(result));
            return Ok(());
        }
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => {
                self.pop();
                self.pop();
                self.stack.push(Value::Int(x.wrapping_add(y)));
                Ok(())
            }
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => {
                    self.pop();
                    self.pop();
                    self.stack.push(Value::Number(x + y));
                    Ok(())
                }
                _ => Err(self.fault(
                    frame,
                    ErrorKind::Value,
                    "Operands must be two numbers or first operand must be a string.".to_string(),
                )),
            },
        }
    }

    fn subtract(&mut self, frame: &CallFrame) -> Result<(), RuntimeError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Int(x), Value::Int(y)) => {
                self.pop();
                self.pop();
                self.stack.push(Value::Int(x.wrapping_sub(y)));
                Ok(())
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => {
                    self.pop();
                    self.pop();
                    self.stack.push(Value::Number(x - y));
                    Ok(())
                }
                _ => Err(self.fault(
                    frame,
                    ErrorKind::Value,
                    "Operands must be numbers.".to_string(),
                )),
            },
        }
    }

    fn multiply(&mut self, frame: &CallFrame) -> Result<(), RuntimeError> {
        let b = self.peek(0);
        let a = self.peek(1);
        if self.is_string(a) {
            let Value::Int(count) = b else {
                return Err(self.fault(
                    frame,
                    ErrorKind::Value,
                    "String multiplier must be an Integer.".to_string(),
                ));
            };
            let repeated = self
                .as_chars(a)
                .map(|s| s.repeat(count as usize))
                .unwrap_or_default();
            self.pop();
            self.pop();
            let result = self.heap.take_string(repeated);
            self.stack.push(Value::Obj(result));
            return Ok(());
        }
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => {
                self.pop();
                self.pop();
                self.stack.push(Value::Int(x.wrapping_mul(y)));
                Ok(())
            }
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => {
                    self.pop();
                    self.pop();
                    self.stack.push(Value::Number(x * y));
                    Ok(())
                }
                _ => Err(self.fault(
                    frame,
                    ErrorKind::Value,
                    "Operands must be two numbers or first operand must be a string.".to_string(),
                )),
            },
        }
    }

    fn divide(&mut self, frame: &CallFrame) -> Result<(), RuntimeError> {
        // Always double division; IEEE handles zero.
        match (self.peek(1).as_f64(), self.peek(0).as_f64()) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.stack.push(Value::Number(a / b));
                Ok(())
            }
            _ => Err(self.fault(
                frame,
                ErrorKind::Value,
                "Operands must be numbers.".to_string(),
            )),
        }
    }

    fn integer_op(&mut self, frame: &CallFrame, op: OpCode) -> Result<(), RuntimeError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Int(x), Value::Int(y)) => {
                if op == OpCode::Modulo && y == 0 {
                    return Err(self.fault(
                        frame,
                        ErrorKind::Value,
                        "Modulo by zero.".to_string(),
                    ));
                }
                self.pop();
                self.pop();
                let result = match op {
                    OpCode::Modulo => x % y,
                    OpCode::LeftShift => x.wrapping_shl(y as u32),
                    _ => x.wrapping_shr(y as u32),
                };
                self.stack.push(Value::Int(result));
                Ok(())
            }
            _ => Err(self.fault(
                frame,
                ErrorKind::Value,
                "Operands must be Integers.".to_string(),
            )),
        }
    }

    fn negate(&mut self, frame: &CallFrame) -> Result<(), RuntimeError> {
        match self.peek(0) {
            Value::Number(n) => {
                self.pop();
                self.stack.push(Value::Number(-n));
                Ok(())
            }
            // Negation promotes to double; there is no signed integer type.
            Value::Int(i) => {
                self.pop();
                self.stack.push(Value::Number(-(i as f64)));
                Ok(())
            }
            _ => Err(self.fault(
                frame,
                ErrorKind::Value,
                "Operand must be a number.".to_string(),
            )),
        }
    }

    // ----- calls ----------------------------------------------------------

    fn call_value(&mut self, frame: &mut CallFrame, argc: usize) -> Result<(), RuntimeError> {
        let callee = self.peek(argc);
        let resolved = match callee {
            Value::Obj(r) => match self.heap.object(r) {
                Object::Function(f) => Callee::Function {
                    object: r,
                    arity: f.arity as usize,
                    def_arity: f.def_arity as usize,
                    default_start: f.default_start,
                },
                Object::Native(native) => Callee::Native(*native),
                Object::Str(_) => Callee::NotCallable,
            },
            _ => Callee::NotCallable,
        };

        match resolved {
            Callee::Function {
                object,
                arity,
                def_arity,
                default_start,
            } => {
                let required = arity - def_arity;
                if argc != arity && argc != required {
                    let message = format!("Expected {required} arguments but got {argc}.");
                    return Err(self.fault(frame, ErrorKind::Argument, message));
                }
                if self.frames.len() + 1 == self.frames_max {
                    return Err(self.fault(frame, ErrorKind::Frame, "StackOverflow.".to_string()));
                }
                // Defaults were supplied: skip the prologue that computes them.
                let entry = if argc == arity { default_start } else { 0 };
                tracing::trace!(callee = %self.heap.render(callee), argc, "call");
                self.frames.push(*frame);
                *frame = CallFrame {
                    function: object,
                    ip: entry,
                    base: self.stack.len() - 1 - argc,
                };
                Ok(())
            }
            Callee::Native(native) => {
                let args_start = self.stack.len() - argc;
                let result = native(&self.stack[args_start..]);
                self.stack.truncate(args_start - 1);
                self.stack.push(result);
                Ok(())
            }
            Callee::NotCallable => Err(self.fault(
                frame,
                ErrorKind::Call,
                "Can only call functions and classes.".to_string(),
            )),
        }
    }

    // ----- dispatch -------------------------------------------------------

    fn run(&mut self, mut frame: CallFrame) -> Result<(), RuntimeError> {
        loop {
            let byte = self.read_byte(&mut frame);
            let Some(op) = OpCode::from_byte(byte) else {
                let message = format!("Unknown opcode {byte}.");
                return Err(self.fault(&frame, ErrorKind::Frame, message));
            };

            match op {
                OpCode::Constant => {
                    let index = self.read_byte(&mut frame) as usize;
                    let value = self.constant(&frame, index);
                    self.stack.push(value);
                }
                OpCode::ConstantLong => {
                    let index = self.read_u16(&mut frame) as usize;
                    let value = self.constant(&frame, index);
                    self.stack.push(value);
                }
                OpCode::None => self.stack.push(Value::None),
                OpCode::True => self.stack.push(Value::Bool(true)),
                OpCode::False => self.stack.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::Dup => {
                    let top = self.peek(0);
                    self.stack.push(top);
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte(&mut frame) as usize;
                    let value = self.stack[frame.base + slot];
                    self.stack.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte(&mut frame) as usize;
                    self.stack[frame.base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let index = self.read_u16(&mut frame) as usize;
                    let name = self.constant(&frame, index);
                    match self.globals.get(self.heap.objects(), name) {
                        Some(value) => self.stack.push(value),
                        None => {
                            let message =
                                format!("Undefined variable '{}'.", self.heap.render(name));
                            return Err(self.fault(&frame, ErrorKind::Value, message));
                        }
                    }
                }
                OpCode::DefGlobal => {
                    let index = self.read_u16(&mut frame) as usize;
                    let name = self.constant(&frame, index);
                    let value = self.peek(0);
                    self.globals.set(self.heap.objects(), name, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let index = self.read_u16(&mut frame) as usize;
                    let name = self.constant(&frame, index);
                    let value = self.peek(0);
                    if self.globals.set(self.heap.objects(), name, value) {
                        // Assignment must not create globals; undo the insert.
                        self.globals.delete(self.heap.objects(), name);
                        let message = format!("Undefined variable '{}'.", self.heap.render(name));
                        return Err(self.fault(&frame, ErrorKind::Value, message));
                    }
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.stack.push(Value::Bool(a == b));
                }
                OpCode::Greater | OpCode::Less => self.comparison(&frame, op)?,
                OpCode::Add => self.add(&frame)?,
                OpCode::Subtract => self.subtract(&frame)?,
                OpCode::Multiply => self.multiply(&frame)?,
                OpCode::Divide => self.divide(&frame)?,
                OpCode::Modulo | OpCode::LeftShift | OpCode::RightShift => {
                    self.integer_op(&frame, op)?;
                }
                OpCode::Not => {
                    let value = self.pop();
                    let falsey = is_falsey(value, self.heap.objects());
                    self.stack.push(Value::Bool(falsey));
                }
                OpCode::Negate => self.negate(&frame)?,
                OpCode::Print => {
                    let value = self.pop();
                    let text = self.heap.render(value);
                    let _ = writeln!(self.out, "{text}");
                }
                OpCode::Jump => {
                    let offset = self.read_u16(&mut frame) as usize;
                    frame.ip += offset;
                }
                OpCode::JumpFalse => {
                    let offset = self.read_u16(&mut frame) as usize;
                    if is_falsey(self.peek(0), self.heap.objects()) {
                        frame.ip += offset;
                    }
                }
                OpCode::JumpLong => {
                    let offset = self.read_u32(&mut frame) as usize;
                    frame.ip += offset;
                }
                OpCode::JumpFalseLong => {
                    let offset = self.read_u32(&mut frame) as usize;
                    if is_falsey(self.peek(0), self.heap.objects()) {
                        frame.ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16(&mut frame) as usize;
                    frame.ip -= offset;
                }
                OpCode::LoopLong => {
                    let offset = self.read_u32(&mut frame) as usize;
                    frame.ip -= offset;
                }
                OpCode::Call => {
                    let argc = self.read_byte(&mut frame) as usize;
                    self.call_value(&mut frame, argc)?;
                }
                OpCode::Return => {
                    let result = self.pop();
                    match self.frames.pop() {
                        Some(parent) => {
                            // Drop the callee and its window, keep the result.
                            self.stack.truncate(frame.base);
                            self.stack.push(result);
                            frame = parent;
                        }
                        None => {
                            // The script function itself.
                            self.pop();
                            debug_assert!(self.stack.is_empty());
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}
