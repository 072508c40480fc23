//! Heap objects and the owning arena.
//!
//! The [`Heap`] is the single owner of every object the interpreter ever
//! allocates: strings, functions, and native bindings. Handles ([`ObjRef`])
//! are plain indices, so copies of a [`Value`] never own anything and the
//! whole heap is released in one pass when the VM is dropped. There is no
//! collector; the arena only grows.
//!
//! All strings pass through the intern set, so byte-equal strings share one
//! `ObjRef` and string equality reduces to handle identity.

use crate::chunk::Chunk;
use crate::table::Table;
use crate::value::{Value, format_number};

/// Host-implemented function: receives the argument window, returns a value.
pub type NativeFn = fn(args: &[Value]) -> Value;

/// Handle to a heap object. Stable for the life of the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjRef(u32);

impl ObjRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An immutable string with its precomputed FNV-1a hash.
#[derive(Debug)]
pub struct StrObj {
    pub chars: String,
    pub hash: u32,
}

/// A compiled function.
#[derive(Debug)]
pub struct Function {
    /// Total formal parameters, defaulted ones included.
    pub arity: u8,
    /// Trailing parameters that carry default values.
    pub def_arity: u8,
    /// Code offset just past the compiled default-value expressions.
    ///
    /// A call that supplies every argument enters here; a call that omits
    /// the defaulted tail enters at offset 0 so the prologue fills the
    /// missing slots.
    pub default_start: usize,
    pub chunk: Chunk,
    /// Interned name; `None` for the top-level script.
    pub name: Option<ObjRef>,
}

#[derive(Debug)]
pub enum Object {
    Str(StrObj),
    Function(Function),
    Native(NativeFn),
}

/// FNV-1a over the raw bytes, 32-bit.
pub fn hash_string(chars: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for byte in chars.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

/// The object arena plus the string intern set.
pub struct Heap {
    objects: Vec<Object>,
    strings: Table,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            objects: Vec::new(),
            strings: Table::new(),
        }
    }

    /// The backing object slice, for hash/equality helpers that need to
    /// resolve `Obj` handles.
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn object(&self, r: ObjRef) -> &Object {
        &self.objects[r.index()]
    }

    /// The string behind `r`, if `r` is a string.
    pub fn as_str(&self, r: ObjRef) -> Option<&StrObj> {
        match &self.objects[r.index()] {
            Object::Str(s) => Some(s),
            _ => None,
        }
    }

    fn alloc(&mut self, object: Object) -> ObjRef {
        let index = self.objects.len();
        self.objects.push(object);
        ObjRef(index as u32)
    }

    /// Intern a borrowed string, copying only on an intern miss.
    pub fn copy_string(&mut self, chars: &str) -> ObjRef {
        let hash = hash_string(chars);
        if let Some(existing) = self.strings.find_string(&self.objects, chars, hash) {
            return existing;
        }
        self.intern_new(chars.to_owned(), hash)
    }

    /// Intern an owned string, adopting the buffer on an intern miss.
    /// This is the variant concatenation and replication use.
    pub fn take_string(&mut self, chars: String) -> ObjRef {
        let hash = hash_string(&chars);
        if let Some(existing) = self.strings.find_string(&self.objects, &chars, hash) {
            return existing;
        }
        self.intern_new(chars, hash)
    }

    fn intern_new(&mut self, chars: String, hash: u32) -> ObjRef {
        let r = self.alloc(Object::Str(StrObj { chars, hash }));
        let Heap { objects, strings } = self;
        strings.set(objects, Value::Obj(r), Value::Bool(true));
        r
    }

    pub fn alloc_function(&mut self, function: Function) -> ObjRef {
        self.alloc(Object::Function(function))
    }

    pub fn alloc_native(&mut self, function: NativeFn) -> ObjRef {
        self.alloc(Object::Native(function))
    }

    /// Render a value the way `print` and string coercion show it.
    pub fn render(&self, value: Value) -> String {
        match value {
            Value::Bool(true) => "true".to_string(),
            Value::Bool(false) => "false".to_string(),
            Value::None => "none".to_string(),
            Value::Number(n) => format_number(n),
            Value::Int(i) => i.to_string(),
            Value::Obj(r) => match &self.objects[r.index()] {
                Object::Str(s) => s.chars.clone(),
                Object::Function(f) => match f.name.and_then(|n| self.as_str(n)) {
                    Some(name) => format!("<fn {}>", name.chars),
                    None => "<script>".to_string(),
                },
                Object::Native(_) => "<native fn>".to_string(),
            },
            Value::Empty => "<empty>".to_string(),
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}
