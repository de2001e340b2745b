//! The ordered, copy-on-write array engine.
//!
//! ## PHP Semantics
//!
//! A PHP array is an ordered map from int/string keys to values. This
//! engine reproduces the behaviors scripts depend on:
//!
//! - iteration order is insertion order; overwriting a key keeps its
//!   original position
//! - canonical decimal string keys collapse to integer keys
//! - the auto-append key is `1 + max integer key ever present`, cached,
//!   and recomputed by full scan only when the entry holding the current
//!   maximum is removed
//! - plain assignment shares the backing store (copy-on-write); the first
//!   mutating call on any holder materializes a private copy
//! - a slot holds either an inline value (copied freely) or a shared
//!   reference cell (only the handle is copied)
//!
//! COW is carried by the `Rc` around `ArrayData`: clone the handle to
//! share, `Rc::make_mut` to materialize. Each holder that writes gets its
//! own copy independently, so three-way sharing splits correctly.
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_hash.c - HashTable operations

use crate::core::compare::{loose_eq, strict_eq};
use crate::core::string::{parse_numeric_prefix, StringValue};
use crate::core::value::Value;
use crate::core::var::Var;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::rc::Rc;

/// Array key: integer or (non-canonical-decimal) string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(Rc<Vec<u8>>),
}

impl ArrayKey {
    /// Normalize string bytes into a key. Canonical decimal integers
    /// (optional `-`, no leading zeros, in i64 range) become int keys;
    /// everything else stays a string key.
    pub fn from_bytes(bytes: &[u8]) -> ArrayKey {
        if Self::is_canonical_decimal(bytes) {
            if let Ok(text) = std::str::from_utf8(bytes) {
                if let Ok(i) = text.parse::<i64>() {
                    return ArrayKey::Int(i);
                }
            }
        }
        ArrayKey::Str(Rc::new(bytes.to_vec()))
    }

    fn is_canonical_decimal(bytes: &[u8]) -> bool {
        let digits = match bytes {
            [] => return false,
            [b'-', rest @ ..] => rest,
            all => all,
        };
        match digits {
            [] => false,
            // "-0" and leading zeros are not canonical.
            [b'0'] => bytes.len() == 1,
            [b'0', ..] => false,
            _ => digits.iter().all(|b| b.is_ascii_digit()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ArrayKey::Int(i) => Value::Int(*i),
            ArrayKey::Str(s) => Value::String(StringValue::Binary(s.clone())),
        }
    }
}

/// A storage slot: an inline value or a shared reference cell.
///
/// Copying a slot copies inline values and shares *referenced* cells; an
/// unreferenced cell (created by `get_ref` but never aliased) collapses
/// back to an inline value, so stale promotions never leak aliasing into
/// a copy.
#[derive(Debug)]
pub enum Slot {
    Value(Value),
    Ref(Var),
}

impl Slot {
    pub fn get(&self) -> Value {
        match self {
            Slot::Value(v) => v.clone(),
            Slot::Ref(var) => var.get(),
        }
    }

    /// Write through the slot: an inline slot is replaced, a reference
    /// cell is written through (all aliases see the new value).
    pub fn set(&mut self, value: Value) {
        match self {
            Slot::Value(v) => *v = value,
            Slot::Ref(var) => var.set(value),
        }
    }

    pub fn as_ref_var(&self) -> Option<&Var> {
        match self {
            Slot::Ref(var) => Some(var),
            Slot::Value(_) => None,
        }
    }
}

impl Clone for Slot {
    fn clone(&self) -> Self {
        match self {
            Slot::Value(v) => Slot::Value(v.clone()),
            Slot::Ref(var) if var.is_referenced() => Slot::Ref(var.clone()),
            Slot::Ref(var) => Slot::Value(var.get()),
        }
    }
}

#[derive(Debug, Clone)]
struct ArrayData {
    entries: IndexMap<ArrayKey, Slot>,
    /// Cached next auto-append key; `None` forces a rescan.
    next_free: Option<i64>,
    /// Internal iteration pointer; `len` means past-the-end.
    cursor: usize,
}

impl ArrayData {
    fn new() -> Self {
        ArrayData {
            entries: IndexMap::new(),
            next_free: Some(0),
            cursor: 0,
        }
    }

    fn rescan_next_free(&self) -> i64 {
        self.entries
            .keys()
            .filter_map(|k| match k {
                ArrayKey::Int(i) => Some(*i),
                ArrayKey::Str(_) => None,
            })
            .fold(0, |acc, i| acc.max(i.saturating_add(1)))
    }

    fn note_inserted_key(&mut self, key: &ArrayKey) {
        if let (ArrayKey::Int(i), Some(nf)) = (key, self.next_free) {
            if *i >= nf {
                self.next_free = Some(i.saturating_add(1));
            }
        }
    }

    fn note_removed_key(&mut self, key: &ArrayKey) {
        // Only removing the entry that holds the current maximum
        // invalidates the cache.
        if let (ArrayKey::Int(i), Some(nf)) = (key, self.next_free) {
            if i.saturating_add(1) == nf {
                self.next_free = None;
            }
        }
    }
}

/// An ordered PHP array. Cloning shares the backing store (COW).
#[derive(Debug, Clone)]
pub struct ArrayValue {
    data: Rc<ArrayData>,
}

impl Default for ArrayValue {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayValue {
    pub fn new() -> Self {
        ArrayValue {
            data: Rc::new(ArrayData::new()),
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut arr = ArrayValue::new();
        for v in values {
            arr.push(v);
        }
        arr
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (ArrayKey, Value)>) -> Self {
        let mut arr = ArrayValue::new();
        for (k, v) in pairs {
            arr.put(k, v);
        }
        arr
    }

    /// Materialize a private copy if the store is shared, then hand out
    /// mutable access. This is the single COW choke point.
    fn data_mut(&mut self) -> &mut ArrayData {
        Rc::make_mut(&mut self.data)
    }

    /// True while this handle shares its store with another holder.
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.data) > 1
    }

    pub fn len(&self) -> usize {
        self.data.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ArrayKey, &Slot)> {
        self.data.entries.iter()
    }

    pub fn keys(&self) -> Vec<ArrayKey> {
        self.data.entries.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.data.entries.values().map(Slot::get).collect()
    }

    pub fn get(&self, key: &ArrayKey) -> Value {
        self.get_opt(key).unwrap_or(Value::Unset)
    }

    pub fn get_opt(&self, key: &ArrayKey) -> Option<Value> {
        self.data.entries.get(key).map(Slot::get)
    }

    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.data.entries.contains_key(key)
    }

    /// Loose value scan; returns the first matching key.
    pub fn contains(&self, value: &Value) -> Option<ArrayKey> {
        self.data
            .entries
            .iter()
            .find(|(_, slot)| loose_eq(&slot.get(), value))
            .map(|(k, _)| k.clone())
    }

    /// Strict value scan.
    pub fn contains_strict(&self, value: &Value) -> Option<ArrayKey> {
        self.data
            .entries
            .iter()
            .find(|(_, slot)| strict_eq(&slot.get(), value))
            .map(|(k, _)| k.clone())
    }

    /// Insert or overwrite. Overwriting preserves the entry's original
    /// position; storing a reference value shares the cell by identity.
    /// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - zend_hash_update
    pub fn put(&mut self, key: ArrayKey, value: Value) {
        let data = self.data_mut();
        match value {
            Value::Ref(var) => {
                var.set_referenced();
                data.note_inserted_key(&key);
                data.entries.insert(key, Slot::Ref(var));
            }
            plain => {
                if let Some(slot) = data.entries.get_mut(&key) {
                    slot.set(plain);
                } else {
                    data.note_inserted_key(&key);
                    data.entries.insert(key, Slot::Value(plain));
                }
            }
        }
    }

    /// Raw slot insertion, bypassing the reference-flag handling in `put`.
    /// Container decoders use this to wire shared cells directly.
    pub fn insert_slot(&mut self, key: ArrayKey, slot: Slot) {
        let data = self.data_mut();
        data.note_inserted_key(&key);
        data.entries.insert(key, slot);
    }

    /// `append` is `put`; the name matches the subscript-store operation.
    pub fn append(&mut self, key: ArrayKey, value: Value) {
        self.put(key, value);
    }

    /// Auto-append (`$a[] = v`). Returns the key that was used.
    pub fn push(&mut self, value: Value) -> i64 {
        let key = self.create_tail_key();
        self.put(ArrayKey::Int(key), value);
        key
    }

    /// The next auto-append key, recomputed by full scan when the cache
    /// was invalidated by removal of the maximum entry.
    pub fn create_tail_key(&mut self) -> i64 {
        let data = self.data_mut();
        match data.next_free {
            Some(nf) => nf,
            None => {
                let nf = data.rescan_next_free();
                data.next_free = Some(nf);
                nf
            }
        }
    }

    /// Remove a key, returning its value (`Unset` when absent).
    pub fn remove(&mut self, key: &ArrayKey) -> Value {
        let data = self.data_mut();
        match data.entries.shift_remove_full(key) {
            Some((index, removed_key, slot)) => {
                data.note_removed_key(&removed_key);
                if index < data.cursor {
                    data.cursor -= 1;
                }
                slot.get()
            }
            None => Value::Unset,
        }
    }

    /// Remove the last entry.
    pub fn pop(&mut self) -> Value {
        let data = self.data_mut();
        match data.entries.pop() {
            Some((key, slot)) => {
                data.note_removed_key(&key);
                if data.cursor > data.entries.len() {
                    data.cursor = data.entries.len();
                }
                slot.get()
            }
            None => Value::Unset,
        }
    }

    /// Prepend a value under a fresh tail-style key. Existing keys keep
    /// their values; only positions shift.
    pub fn unshift(&mut self, value: Value) {
        let key = self.create_tail_key();
        let data = self.data_mut();
        data.next_free = Some(key.saturating_add(1));
        let slot = match value {
            Value::Ref(var) => {
                var.set_referenced();
                Slot::Ref(var)
            }
            plain => Slot::Value(plain),
        };
        data.entries.shift_insert(0, ArrayKey::Int(key), slot);
        data.cursor = 0;
    }

    /// Positional slice removal/insertion. Removed int-keyed entries are
    /// renumbered from 0 in the returned array; string keys are kept.
    /// Replacement entries with int keys get fresh tail keys, string keys
    /// are preserved.
    pub fn splice(&mut self, start: usize, end: usize, replacement: Option<&ArrayValue>) -> ArrayValue {
        let len = self.len();
        let start = start.min(len);
        let end = end.clamp(start, len);

        let mut removed = ArrayValue::new();
        {
            let data = self.data_mut();
            let drained: Vec<(ArrayKey, Slot)> = data.entries.drain(start..end).collect();
            let mut any_int_removed = false;
            for (key, slot) in drained {
                match key {
                    ArrayKey::Int(_) => {
                        any_int_removed = true;
                        removed.push(slot.get());
                    }
                    ArrayKey::Str(_) => removed.put(key, slot.get()),
                }
            }
            if any_int_removed {
                data.next_free = None;
            }
            data.cursor = 0;
        }

        if let Some(replacement) = replacement {
            let mut pos = start;
            for (key, slot) in replacement.entries() {
                match key {
                    ArrayKey::Int(_) => {
                        let fresh = self.create_tail_key();
                        let data = self.data_mut();
                        data.next_free = Some(fresh.saturating_add(1));
                        data.entries.shift_insert(pos, ArrayKey::Int(fresh), slot.clone());
                    }
                    ArrayKey::Str(_) => {
                        let data = self.data_mut();
                        data.entries.shift_insert(pos, key.clone(), slot.clone());
                    }
                }
                pos += 1;
            }
        }

        removed
    }

    /// Read-only copy of a positional range. Without `preserve_keys`,
    /// int keys are renumbered from 0; string keys always survive.
    pub fn slice(&self, start: usize, end: usize, preserve_keys: bool) -> ArrayValue {
        let len = self.len();
        let start = start.min(len);
        let end = end.clamp(start, len);

        let mut result = ArrayValue::new();
        for index in start..end {
            if let Some((key, slot)) = self.data.entries.get_index(index) {
                match key {
                    ArrayKey::Int(_) if !preserve_keys => {
                        result.push(slot.get());
                    }
                    _ => result.put(key.clone(), slot.get()),
                }
            }
        }
        result
    }

    /// Stable sort by value. `reset_keys` renumbers integer keys from 0 in
    /// the new order; `strict` additionally renumbers string keys that
    /// merely look numeric.
    pub fn sort<F>(&mut self, mut cmp: F, reset_keys: bool, strict: bool)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let data = self.data_mut();
        let mut items: Vec<(ArrayKey, Slot)> = data.entries.drain(..).collect();
        items.sort_by(|a, b| cmp(&a.1.get(), &b.1.get()));

        let mut next = 0i64;
        for (key, slot) in items {
            let renumber = match &key {
                ArrayKey::Int(_) => reset_keys,
                ArrayKey::Str(s) => {
                    reset_keys && strict && {
                        let scan = parse_numeric_prefix(s);
                        scan.matched && scan.fully_numeric
                    }
                }
            };
            if renumber {
                data.entries.insert(ArrayKey::Int(next), slot);
                next += 1;
            } else {
                data.entries.insert(key, slot);
            }
        }
        data.next_free = None;
        data.cursor = 0;
    }

    /// Lazily promote a slot into a shared cell and return it. Creates a
    /// null entry when the key is absent. This is the array-to-reference
    /// promotion boundary (`$r = &$a[k]`).
    pub fn get_ref(&mut self, key: ArrayKey) -> Var {
        let data = self.data_mut();
        if !data.entries.contains_key(&key) {
            data.note_inserted_key(&key);
            data.entries.insert(key.clone(), Slot::Value(Value::Null));
        }
        let slot = data.entries.get_mut(&key).unwrap();
        match slot {
            Slot::Ref(var) => var.clone(),
            Slot::Value(v) => {
                let var = Var::new(std::mem::replace(v, Value::Null));
                *slot = Slot::Ref(var.clone());
                var
            }
        }
    }

    /// Union for `+`: keys of `self` win, missing keys come from `other`.
    pub fn union(&self, other: &ArrayValue) -> ArrayValue {
        let mut result = self.clone();
        for (key, slot) in other.entries() {
            if !result.contains_key(key) {
                let data = result.data_mut();
                data.note_inserted_key(key);
                data.entries.insert(key.clone(), slot.clone());
            }
        }
        result
    }

    // -- cursor ---------------------------------------------------------

    pub fn reset(&mut self) -> Value {
        self.data_mut().cursor = 0;
        self.current()
    }

    pub fn end(&mut self) -> Value {
        let len = self.len();
        self.data_mut().cursor = len.saturating_sub(1);
        if len == 0 { Value::Bool(false) } else { self.current() }
    }

    pub fn current(&self) -> Value {
        match self.data.entries.get_index(self.data.cursor) {
            Some((_, slot)) => slot.get(),
            None => Value::Bool(false),
        }
    }

    pub fn current_key(&self) -> Value {
        match self.data.entries.get_index(self.data.cursor) {
            Some((key, _)) => key.to_value(),
            None => Value::Null,
        }
    }

    pub fn next(&mut self) -> Value {
        let data = self.data_mut();
        if data.cursor < data.entries.len() {
            data.cursor += 1;
        }
        self.current()
    }

    pub fn prev(&mut self) -> Value {
        let data = self.data_mut();
        if data.cursor == 0 {
            // Stepping before the first entry parks the cursor past the
            // end, so current() reports false until reset.
            data.cursor = data.entries.len();
        } else {
            data.cursor -= 1;
        }
        self.current()
    }

    /// `each()`: the 4-slot `[0=>key,'key'=>key,1=>value,'value'=>value]`
    /// array for the current entry, advancing the cursor; false past the
    /// end.
    pub fn each(&mut self) -> Value {
        let (key, value) = match self.data.entries.get_index(self.data.cursor) {
            Some((key, slot)) => (key.to_value(), slot.get()),
            None => return Value::Bool(false),
        };
        self.data_mut().cursor += 1;

        let mut pair = ArrayValue::new();
        pair.put(ArrayKey::Int(0), key.clone());
        pair.put(ArrayKey::from_bytes(b"key"), key);
        pair.put(ArrayKey::Int(1), value.clone());
        pair.put(ArrayKey::from_bytes(b"value"), value);
        Value::Array(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_key(i: i64) -> ArrayKey {
        ArrayKey::Int(i)
    }

    #[test]
    fn key_normalization() {
        assert_eq!(ArrayKey::from_bytes(b"7"), ArrayKey::Int(7));
        assert_eq!(ArrayKey::from_bytes(b"-7"), ArrayKey::Int(-7));
        assert_eq!(ArrayKey::from_bytes(b"0"), ArrayKey::Int(0));
        assert!(matches!(ArrayKey::from_bytes(b"07"), ArrayKey::Str(_)));
        assert!(matches!(ArrayKey::from_bytes(b"-0"), ArrayKey::Str(_)));
        assert!(matches!(ArrayKey::from_bytes(b"1.5"), ArrayKey::Str(_)));
        assert!(matches!(ArrayKey::from_bytes(b""), ArrayKey::Str(_)));
        // Out of i64 range stays a string key.
        assert!(matches!(
            ArrayKey::from_bytes(b"99999999999999999999"),
            ArrayKey::Str(_)
        ));
    }

    #[test]
    fn overwrite_preserves_position() {
        let mut a = ArrayValue::new();
        a.put(ArrayKey::from_bytes(b"x"), Value::Int(1));
        a.put(int_key(5), Value::Int(2));
        a.put(ArrayKey::from_bytes(b"x"), Value::Int(99));
        let keys = a.keys();
        assert_eq!(keys[0], ArrayKey::from_bytes(b"x"));
        assert_eq!(keys[1], int_key(5));
        assert_eq!(a.get(&ArrayKey::from_bytes(b"x")), Value::Int(99));
    }

    #[test]
    fn tail_key_recomputed_after_removing_max() {
        let mut a = ArrayValue::new();
        a.push(Value::from("a"));
        a.push(Value::from("b"));
        a.remove(&int_key(1));
        let key = a.push(Value::from("c"));
        assert_eq!(key, 1);
        assert_eq!(a.get(&int_key(1)), Value::from("c"));
    }

    #[test]
    fn tail_key_not_reused_when_removing_non_max() {
        let mut a = ArrayValue::new();
        a.push(Value::Int(10));
        a.push(Value::Int(11));
        a.push(Value::Int(12));
        a.remove(&int_key(0));
        assert_eq!(a.push(Value::Int(13)), 3);
    }

    #[test]
    fn pop_invalidates_tail_cache() {
        let mut a = ArrayValue::from_values([Value::Int(1), Value::Int(2), Value::Int(3)]);
        a.pop();
        assert_eq!(a.push(Value::Int(9)), 2);
    }

    #[test]
    fn negative_keys_do_not_go_backwards() {
        let mut a = ArrayValue::new();
        a.put(int_key(-5), Value::Int(1));
        assert_eq!(a.push(Value::Int(2)), 0);
    }

    #[test]
    fn cow_isolation() {
        let mut a = ArrayValue::from_values([Value::Int(1), Value::Int(2), Value::Int(3)]);
        let mut b = a.clone();
        assert!(a.is_shared());
        b.push(Value::Int(4));
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 4);
        assert!(!a.is_shared());

        // Writing through the original afterwards stays private too.
        a.put(int_key(0), Value::Int(99));
        assert_eq!(b.get(&int_key(0)), Value::Int(1));
    }

    #[test]
    fn three_way_cow_each_writer_materializes() {
        let a = ArrayValue::from_values([Value::Int(1)]);
        let mut b = a.clone();
        let mut c = a.clone();
        b.push(Value::Int(2));
        c.push(Value::Int(3));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
        assert_eq!(c.len(), 2);
        assert_eq!(b.get(&int_key(1)), Value::Int(2));
        assert_eq!(c.get(&int_key(1)), Value::Int(3));
    }

    #[test]
    fn referenced_slots_survive_copy_unreferenced_collapse() {
        let mut a = ArrayValue::from_values([Value::Int(1), Value::Int(2)]);
        let aliased = a.get_ref(int_key(0)).to_ref_var();
        let _plain = a.get_ref(int_key(1)); // promoted but never aliased

        let b = a.clone();
        // Force materialization of the copy.
        let mut b = b;
        b.push(Value::Int(3));

        aliased.set(Value::Int(77));
        // The aliased slot is shared with the copy, the plain one is not.
        assert_eq!(b.get(&int_key(0)), Value::Int(77));
        assert_eq!(b.get(&int_key(1)), Value::Int(2));
    }

    #[test]
    fn cursor_walk_and_each() {
        let mut a = ArrayValue::from_values([Value::from("a"), Value::from("b")]);
        assert_eq!(a.reset(), Value::from("a"));
        assert_eq!(a.current_key(), Value::Int(0));
        assert_eq!(a.next(), Value::from("b"));
        assert_eq!(a.next(), Value::Bool(false));
        assert_eq!(a.end(), Value::from("b"));
        assert_eq!(a.prev(), Value::from("a"));

        a.reset();
        let pair = match a.each() {
            Value::Array(p) => p,
            other => panic!("each() returned {:?}", other),
        };
        assert_eq!(pair.get(&int_key(0)), Value::Int(0));
        assert_eq!(pair.get(&ArrayKey::from_bytes(b"key")), Value::Int(0));
        assert_eq!(pair.get(&int_key(1)), Value::from("a"));
        assert_eq!(pair.get(&ArrayKey::from_bytes(b"value")), Value::from("a"));
        assert_eq!(
            pair.keys(),
            vec![
                int_key(0),
                ArrayKey::from_bytes(b"key"),
                int_key(1),
                ArrayKey::from_bytes(b"value"),
            ]
        );
        // And the cursor advanced.
        assert_eq!(a.current(), Value::from("b"));
    }

    #[test]
    fn unshift_prepends_with_fresh_key() {
        let mut a = ArrayValue::from_values([Value::from("a"), Value::from("b")]);
        a.unshift(Value::from("z"));
        assert_eq!(a.len(), 3);
        let keys = a.keys();
        assert_eq!(keys[0], int_key(2));
        assert_eq!(keys[1], int_key(0));
        assert_eq!(a.current(), Value::from("z"));
    }

    #[test]
    fn splice_renumbers_and_keeps_string_keys() {
        let mut a = ArrayValue::new();
        a.push(Value::from("a"));
        a.put(ArrayKey::from_bytes(b"k"), Value::from("b"));
        a.push(Value::from("c"));

        let mut replacement = ArrayValue::new();
        replacement.push(Value::from("r1"));
        replacement.put(ArrayKey::from_bytes(b"rk"), Value::from("r2"));

        let removed = a.splice(1, 2, Some(&replacement));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed.get(&ArrayKey::from_bytes(b"k")), Value::from("b"));

        // "r1" got a fresh tail key, "rk" kept its key.
        assert_eq!(a.len(), 4);
        assert_eq!(a.get(&ArrayKey::from_bytes(b"rk")), Value::from("r2"));
        let keys = a.keys();
        assert_eq!(keys[0], int_key(0));
        assert!(matches!(keys[1], ArrayKey::Int(_)));
        assert_eq!(keys[2], ArrayKey::from_bytes(b"rk"));
    }

    #[test]
    fn slice_positional() {
        let mut a = ArrayValue::new();
        a.push(Value::from("a"));
        a.put(int_key(9), Value::from("b"));
        a.put(ArrayKey::from_bytes(b"s"), Value::from("c"));

        let kept = a.slice(1, 3, true);
        assert_eq!(kept.keys(), vec![int_key(9), ArrayKey::from_bytes(b"s")]);

        let renumbered = a.slice(1, 3, false);
        assert_eq!(
            renumbered.keys(),
            vec![int_key(0), ArrayKey::from_bytes(b"s")]
        );
    }

    #[test]
    fn sort_resets_keys() {
        let mut a = ArrayValue::from_values([Value::Int(3), Value::Int(1), Value::Int(2)]);
        a.sort(
            |x, y| crate::core::compare::compare(x, y).unwrap_or(Ordering::Equal),
            true,
            false,
        );
        assert_eq!(a.values(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(a.keys(), vec![int_key(0), int_key(1), int_key(2)]);
    }

    #[test]
    fn sort_strict_renumbers_numeric_looking_string_keys() {
        let mut a = ArrayValue::new();
        a.put(ArrayKey::from_bytes(b"07"), Value::Int(2));
        a.put(ArrayKey::from_bytes(b"name"), Value::Int(1));
        a.sort(
            |x, y| crate::core::compare::compare(x, y).unwrap_or(Ordering::Equal),
            true,
            true,
        );
        // "07" looks numeric and was renumbered; "name" survived.
        assert!(a.contains_key(&int_key(0)));
        assert!(a.contains_key(&ArrayKey::from_bytes(b"name")));
        assert!(!a.contains_key(&ArrayKey::from_bytes(b"07")));
    }

    #[test]
    fn union_prefers_left() {
        let mut a = ArrayValue::new();
        a.put(int_key(0), Value::from("a"));
        let mut b = ArrayValue::new();
        b.put(int_key(0), Value::from("x"));
        b.put(int_key(1), Value::from("y"));
        let u = a.union(&b);
        assert_eq!(u.get(&int_key(0)), Value::from("a"));
        assert_eq!(u.get(&int_key(1)), Value::from("y"));
    }

    #[test]
    fn lookup_scans() {
        let a = ArrayValue::from_values([Value::from("1"), Value::Int(2)]);
        // Loose scan finds the numeric string for an int needle.
        assert_eq!(a.contains(&Value::Int(1)), Some(int_key(0)));
        // Strict scan does not.
        assert_eq!(a.contains_strict(&Value::Int(1)), None);
        assert_eq!(a.contains_strict(&Value::Int(2)), Some(int_key(1)));
    }
}
