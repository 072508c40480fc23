//! Open-addressed hash table keyed by [`Value`].
//!
//! Used for the VM's globals and for the string intern set. Slots have
//! three states encoded in the entry pair itself:
//!
//! - vacant: key `Empty`, value `None`
//! - occupied: key is anything but `Empty`
//! - tombstone: key `Empty`, value `true`
//!
//! Linear probing terminates on the first vacant slot; tombstones keep the
//! probe going so keys inserted past a later deletion stay reachable. The
//! `count` field includes tombstones (they hold load-factor space until the
//! next rehash reclaims them), so deletion never decrements it.

use crate::object::{ObjRef, Object};
use crate::value::{Value, hash_value};

const MAX_LOAD_NUM: usize = 3;
const MAX_LOAD_DEN: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: Value,
    value: Value,
}

const VACANT: Entry = Entry {
    key: Value::Empty,
    value: Value::None,
};

pub struct Table {
    /// Occupied slots plus tombstones.
    count: usize,
    entries: Vec<Entry>,
}

fn find_entry(entries: &[Entry], objects: &[Object], key: Value) -> usize {
    let capacity = entries.len();
    let mut index = hash_value(key, objects) as usize % capacity;
    let mut tombstone: Option<usize> = None;

    loop {
        let entry = &entries[index];
        if let Value::Empty = entry.key {
            if let Value::None = entry.value {
                // Vacant; reuse an earlier tombstone if we passed one.
                return tombstone.unwrap_or(index);
            }
            if tombstone.is_none() {
                tombstone = Some(index);
            }
        } else if entry.key == key {
            return index;
        }

        index = (index + 1) % capacity;
    }
}

impl Table {
    pub fn new() -> Self {
        Table {
            count: 0,
            entries: Vec::new(),
        }
    }

    fn grown_capacity(&self) -> usize {
        if self.entries.len() < 8 {
            8
        } else {
            self.entries.len() * 2
        }
    }

    fn adjust_capacity(&mut self, objects: &[Object], capacity: usize) {
        let mut entries = vec![VACANT; capacity];
        // Rehash drops tombstones, so count resets to the live population.
        self.count = 0;
        for entry in &self.entries {
            if let Value::Empty = entry.key {
                continue;
            }
            let dest = find_entry(&entries, objects, entry.key);
            entries[dest] = *entry;
            self.count += 1;
        }
        self.entries = entries;
    }

    pub fn get(&self, objects: &[Object], key: Value) -> Option<Value> {
        if self.count == 0 {
            return None;
        }
        let index = find_entry(&self.entries, objects, key);
        let entry = &self.entries[index];
        if let Value::Empty = entry.key {
            return None;
        }
        Some(entry.value)
    }

    /// Insert or overwrite. Returns true when the key was not present.
    pub fn set(&mut self, objects: &[Object], key: Value, value: Value) -> bool {
        if (self.count + 1) * MAX_LOAD_DEN > self.entries.len() * MAX_LOAD_NUM {
            let capacity = self.grown_capacity();
            self.adjust_capacity(objects, capacity);
        }

        let index = find_entry(&self.entries, objects, key);
        let entry = &mut self.entries[index];
        let is_new = matches!(entry.key, Value::Empty);
        // A reused tombstone already counts toward the load factor.
        if is_new && matches!(entry.value, Value::None) {
            self.count += 1;
        }
        entry.key = key;
        entry.value = value;
        is_new
    }

    /// Replace an occupied slot with a tombstone. Count is unchanged.
    pub fn delete(&mut self, objects: &[Object], key: Value) -> bool {
        if self.count == 0 {
            return false;
        }
        let index = find_entry(&self.entries, objects, key);
        let entry = &mut self.entries[index];
        if let Value::Empty = entry.key {
            return false;
        }
        entry.key = Value::Empty;
        entry.value = Value::Bool(true);
        true
    }

    /// Copy every live entry of `src` into `self`.
    pub fn add_all(&mut self, objects: &[Object], src: &Table) {
        for entry in &src.entries {
            if !matches!(entry.key, Value::Empty) {
                self.set(objects, entry.key, entry.value);
            }
        }
    }

    /// Intern-set lookup by bytes rather than identity: returns the stored
    /// string whose characters equal `chars`.
    pub fn find_string(&self, objects: &[Object], chars: &str, hash: u32) -> Option<ObjRef> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.entries.len();
        let mut index = hash as usize % capacity;
        loop {
            let entry = &self.entries[index];
            match entry.key {
                Value::Empty => {
                    if let Value::None = entry.value {
                        return None;
                    }
                }
                Value::Obj(r) => {
                    if let Object::Str(s) = &objects[r.index()]
                        && s.hash == hash
                        && s.chars == chars
                    {
                        return Some(r);
                    }
                }
                _ => {}
            }
            index = (index + 1) % capacity;
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Heap;

    #[test]
    fn set_get_roundtrip() {
        let heap = Heap::new();
        let mut table = Table::new();
        for i in 0..100u64 {
            assert!(table.set(heap.objects(), Value::Int(i), Value::Int(i * 2)));
        }
        for i in 0..100u64 {
            assert_eq!(
                table.get(heap.objects(), Value::Int(i)),
                Some(Value::Int(i * 2))
            );
        }
        assert_eq!(table.get(heap.objects(), Value::Int(100)), None);
    }

    #[test]
    fn overwrite_keeps_last_value() {
        let heap = Heap::new();
        let mut table = Table::new();
        assert!(table.set(heap.objects(), Value::Int(1), Value::Bool(false)));
        assert!(!table.set(heap.objects(), Value::Int(1), Value::Bool(true)));
        assert_eq!(
            table.get(heap.objects(), Value::Int(1)),
            Some(Value::Bool(true))
        );
    }

    #[test]
    fn delete_then_get_misses() {
        let heap = Heap::new();
        let mut table = Table::new();
        table.set(heap.objects(), Value::Int(7), Value::None);
        assert!(table.delete(heap.objects(), Value::Int(7)));
        assert_eq!(table.get(heap.objects(), Value::Int(7)), None);
        assert!(!table.delete(heap.objects(), Value::Int(7)));
    }

    #[test]
    fn probing_continues_past_tombstones() {
        let heap = Heap::new();
        let mut table = Table::new();
        // Enough keys to force probe chains, then punch holes in them.
        for i in 0..64u64 {
            table.set(heap.objects(), Value::Int(i), Value::Int(i));
        }
        for i in (0..64u64).step_by(3) {
            assert!(table.delete(heap.objects(), Value::Int(i)));
        }
        for i in 0..64u64 {
            let expected = if i % 3 == 0 { None } else { Some(Value::Int(i)) };
            assert_eq!(table.get(heap.objects(), Value::Int(i)), expected, "key {i}");
        }
        // Reinsertion reuses tombstones and stays consistent.
        for i in (0..64u64).step_by(3) {
            table.set(heap.objects(), Value::Int(i), Value::Int(i + 1000));
        }
        for i in 0..64u64 {
            let expected = if i % 3 == 0 { i + 1000 } else { i };
            assert_eq!(
                table.get(heap.objects(), Value::Int(i)),
                Some(Value::Int(expected))
            );
        }
    }

    #[test]
    fn survives_churn_through_rehash() {
        let heap = Heap::new();
        let mut table = Table::new();
        for round in 0..4u64 {
            for i in 0..200u64 {
                table.set(heap.objects(), Value::Int(i), Value::Int(round));
            }
            for i in (0..200u64).filter(|i| i % 2 == 0) {
                table.delete(heap.objects(), Value::Int(i));
            }
        }
        for i in 0..200u64 {
            let expected = if i % 2 == 0 { None } else { Some(Value::Int(3)) };
            assert_eq!(table.get(heap.objects(), Value::Int(i)), expected);
        }
    }

    #[test]
    fn add_all_copies_live_entries_only() {
        let heap = Heap::new();
        let mut src = Table::new();
        src.set(heap.objects(), Value::Int(1), Value::Int(10));
        src.set(heap.objects(), Value::Int(2), Value::Int(20));
        src.delete(heap.objects(), Value::Int(2));

        let mut dst = Table::new();
        dst.add_all(heap.objects(), &src);
        assert_eq!(dst.get(heap.objects(), Value::Int(1)), Some(Value::Int(10)));
        assert_eq!(dst.get(heap.objects(), Value::Int(2)), None);
    }

    #[test]
    fn find_string_compares_bytes() {
        let mut heap = Heap::new();
        let interned = heap.copy_string("needle");
        // The intern set lives inside the heap; query it through a fresh
        // table that mirrors how the heap stores strings.
        let mut table = Table::new();
        table.set(heap.objects(), Value::Obj(interned), Value::Bool(true));

        let hash = crate::object::hash_string("needle");
        assert_eq!(
            table.find_string(heap.objects(), "needle", hash),
            Some(interned)
        );
        let miss_hash = crate::object::hash_string("missing");
        assert_eq!(table.find_string(heap.objects(), "missing", miss_hash), None);
    }

    #[test]
    fn string_keys_resolve_by_identity() {
        let mut heap = Heap::new();
        let key = heap.copy_string("global");
        let mut table = Table::new();
        table.set(heap.objects(), Value::Obj(key), Value::Int(1));

        // Interning guarantees a byte-equal lookup yields the same handle.
        let same = heap.copy_string("global");
        assert_eq!(
            table.get(heap.objects(), Value::Obj(same)),
            Some(Value::Int(1))
        );
    }
}
