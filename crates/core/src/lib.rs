//! Core data model for the PythOwOn interpreter.
//!
//! This crate holds everything the compiler and the VM share: the tagged
//! [`Value`] representation, the object heap with string interning, the
//! open-addressed [`Table`] used for globals and the intern set, and the
//! bytecode [`Chunk`] with its opcode set.
//!
//! Nothing in here performs I/O or owns policy; the compiler decides what
//! bytes go into a chunk and the VM decides what they mean at runtime.

pub mod chunk;
pub mod object;
pub mod table;
pub mod value;

pub use chunk::{Chunk, MAX_CONSTANTS, OpCode};
pub use object::{Function, Heap, NativeFn, ObjRef, Object, StrObj};
pub use table::Table;
pub use value::Value;
