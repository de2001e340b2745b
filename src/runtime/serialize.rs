//! The `serialize()` / `unserialize()` wire codec.
//!
//! ## PHP Semantics
//!
//! The format is PHP's textual one: `N;`, `b:0;`, `i:42;`, `d:1.5;`,
//! `s:3:"abc";`, `a:n:{...}`, `O:len:"Name":n:{...}`. String lengths are
//! byte counts and the payload is raw, never escaped. Private properties
//! mangle their name as `\0Class\0name`, protected ones as `\0*\0name`.
//!
//! Back references: every serialized value occupies the next slot of a
//! counter starting at 1; keys do not count. A re-encountered object
//! instance emits `r:slot;` (a by-value re-occurrence of the same handle),
//! a re-encountered reference cell emits `R:slot;` (an alias). Decoding
//! reconstructs the same graph, shared cells included.
//!
//! Decoding fails closed: truncation, malformed tokens, oversized length
//! prefixes, bad back-reference slots and unknown classes are all hard
//! errors, never partial values.
//!
//! Reference: $PHP_SRC_PATH/ext/standard/var.c - php_var_serialize,
//! php_var_unserialize

use crate::core::array::{ArrayKey, ArrayValue, Slot};
use crate::core::string::{StringBuilder, StringValue};
use crate::core::value::Value;
use crate::core::var::Var;
use crate::runtime::class::{fold_case, ClassId, Visibility};
use crate::runtime::env::{Env, RuntimeError};
use crate::runtime::object::{create_object, ObjectValue};
use std::collections::HashMap;
use std::fmt;

/// Encode a value. Fails only when a serialization hook fails.
pub fn serialize(env: &mut Env, value: &Value) -> Result<StringValue, RuntimeError> {
    let mut s = Serializer {
        out: StringBuilder::new(),
        count: 0,
        objects: HashMap::new(),
        vars: HashMap::new(),
    };
    s.write_value(env, &value.deref())?;
    Ok(s.out.finish())
}

struct Serializer {
    out: StringBuilder,
    /// Back-reference slot counter; the value being written is slot
    /// `count + 1`.
    count: usize,
    /// Object identity to the slot of its first occurrence.
    objects: HashMap<usize, usize>,
    /// Reference-cell identity to the slot of its first occurrence.
    vars: HashMap<usize, usize>,
}

impl Serializer {
    /// Write one element slot. Shared cells go through the `R:` map;
    /// plain values are written inline.
    fn write_slot(&mut self, env: &mut Env, slot: &Slot) -> Result<(), RuntimeError> {
        if let Some(var) = slot.as_ref_var() {
            if var.is_referenced() {
                if let Some(&index) = self.vars.get(&var.ptr_id()) {
                    self.count += 1;
                    self.out.append_bytes(format!("R:{};", index).as_bytes());
                    return Ok(());
                }
                // Record before descending so cycles resolve to this slot.
                self.vars.insert(var.ptr_id(), self.count + 1);
            }
            let value = var.get();
            return self.write_value(env, &value);
        }
        self.write_value(env, &slot.get())
    }

    fn write_value(&mut self, env: &mut Env, value: &Value) -> Result<(), RuntimeError> {
        self.count += 1;
        match value {
            Value::Null | Value::Unset => {
                self.out.append_bytes(b"N;");
            }
            Value::Bool(b) => {
                self.out
                    .append_bytes(if *b { b"b:1;" } else { b"b:0;" });
            }
            Value::Int(i) => {
                self.out.append_bytes(format!("i:{};", i).as_bytes());
            }
            Value::Float(f) => {
                self.out
                    .append_bytes(format!("d:{};", format_serial_double(*f)).as_bytes());
            }
            Value::String(s) => {
                write_string(&mut self.out, s.as_bytes());
                self.out.append_byte(b';');
            }
            // Resources do not survive the wire; PHP encodes them as i:0.
            Value::Resource(_) => {
                self.out.append_bytes(b"i:0;");
            }
            Value::Array(arr) => {
                self.out
                    .append_bytes(format!("a:{}:{{", arr.len()).as_bytes());
                // Snapshot so element hooks cannot shift the store under us.
                let entries: Vec<(ArrayKey, Slot)> = arr
                    .entries()
                    .map(|(k, s)| (k.clone(), s.clone()))
                    .collect();
                for (key, slot) in entries {
                    self.write_key(&key);
                    self.write_slot(env, &slot)?;
                }
                self.out.append_byte(b'}');
            }
            Value::Object(object) => {
                self.write_object(env, object)?;
            }
            Value::Ref(var) => {
                // A bare reference at this level is a by-value read.
                self.count -= 1;
                let value = var.get();
                self.write_value(env, &value)?;
            }
        }
        Ok(())
    }

    fn write_key(&mut self, key: &ArrayKey) {
        match key {
            ArrayKey::Int(i) => {
                self.out.append_bytes(format!("i:{};", i).as_bytes());
            }
            ArrayKey::Str(s) => {
                write_string(&mut self.out, s);
                self.out.append_byte(b';');
            }
        }
    }

    fn write_object(&mut self, env: &mut Env, object: &ObjectValue) -> Result<(), RuntimeError> {
        if let Some(&index) = self.objects.get(&object.ptr_id()) {
            self.out.append_bytes(format!("r:{};", index).as_bytes());
            return Ok(());
        }
        self.objects.insert(object.ptr_id(), self.count);

        let class_name = object.class_name(env);
        let mut props: Vec<(Vec<u8>, Slot)> = {
            let data = object.borrow_data();
            data.props
                .iter()
                .map(|(name, entry)| {
                    let plain = env.interner.lookup(*name).unwrap_or_default().to_vec();
                    let wire = mangle(env, plain, entry.visibility, entry.declared_in);
                    (wire, entry.slot.clone())
                })
                .collect()
        };

        // __sleep narrows the property list to the names it returns.
        let sleep = env.classes.get(object.class_id()).magic.sleep.clone();
        if let Some(entry) = sleep {
            env.push_class_scope(entry.declared_in);
            let listed = (entry.handler)(env, Some(object), &[]);
            env.pop_class_scope();
            if let Value::Array(names) = listed?.deref() {
                let mut kept = Vec::new();
                for want in names.values() {
                    let want = want.to_string_value();
                    match props.iter().position(|(wire, _)| {
                        unmangle(wire).2 == want.as_bytes()
                    }) {
                        Some(at) => kept.push(props[at].clone()),
                        None => env.notice(format!(
                            "__sleep of {} listed unknown property {}",
                            class_name,
                            String::from_utf8_lossy(want.as_bytes())
                        )),
                    }
                }
                props = kept;
            }
        }

        self.out.append_bytes(
            format!("O:{}:\"{}\":{}:{{", class_name.len(), class_name, props.len()).as_bytes(),
        );
        for (wire, slot) in props {
            write_string(&mut self.out, &wire);
            self.out.append_byte(b';');
            self.write_slot(env, &slot)?;
        }
        self.out.append_byte(b'}');
        Ok(())
    }
}

fn write_string(out: &mut StringBuilder, bytes: &[u8]) {
    out.append_bytes(format!("s:{}:\"", bytes.len()).as_bytes());
    out.append_bytes(bytes);
    out.append_byte(b'"');
}

fn format_serial_double(f: f64) -> String {
    if f.is_nan() {
        "NAN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else {
        format!("{}", f)
    }
}

fn mangle(env: &Env, name: Vec<u8>, visibility: Visibility, declared_in: ClassId) -> Vec<u8> {
    match visibility {
        Visibility::Public => name,
        Visibility::Protected => {
            let mut wire = b"\0*\0".to_vec();
            wire.extend_from_slice(&name);
            wire
        }
        Visibility::Private => {
            let class = &env.classes.get(declared_in).name;
            let mut wire = vec![0u8];
            wire.extend_from_slice(class.as_bytes());
            wire.push(0);
            wire.extend_from_slice(&name);
            wire
        }
    }
}

/// Split a wire property name into (visibility, declaring class, name).
fn unmangle(wire: &[u8]) -> (Visibility, Option<&[u8]>, &[u8]) {
    if let Some(rest) = wire.strip_prefix(b"\0*\0") {
        return (Visibility::Protected, None, rest);
    }
    if let Some(rest) = wire.strip_prefix(b"\0") {
        if let Some(sep) = rest.iter().position(|&b| b == 0) {
            return (Visibility::Private, Some(&rest[..sep]), &rest[sep + 1..]);
        }
    }
    (Visibility::Public, None, wire)
}

/// Decode failure, with the byte offset where decoding stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnserializeError {
    pub offset: usize,
    pub kind: UnserializeErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnserializeErrorKind {
    UnexpectedEnd,
    BadToken,
    BadLength,
    BadBackRef,
    UnknownClass(String),
    TrailingData,
}

impl fmt::Display for UnserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            UnserializeErrorKind::UnexpectedEnd => {
                write!(f, "unexpected end of data at offset {}", self.offset)
            }
            UnserializeErrorKind::BadToken => {
                write!(f, "malformed token at offset {}", self.offset)
            }
            UnserializeErrorKind::BadLength => {
                write!(f, "invalid length at offset {}", self.offset)
            }
            UnserializeErrorKind::BadBackRef => {
                write!(f, "invalid back-reference at offset {}", self.offset)
            }
            UnserializeErrorKind::UnknownClass(name) => {
                write!(f, "unknown class '{}' at offset {}", name, self.offset)
            }
            UnserializeErrorKind::TrailingData => {
                write!(f, "trailing data at offset {}", self.offset)
            }
        }
    }
}

impl std::error::Error for UnserializeError {}

/// Decode one value. The whole input must be consumed.
pub fn unserialize(env: &mut Env, bytes: &[u8]) -> Result<Value, UnserializeError> {
    let mut u = Unserializer {
        input: bytes,
        pos: 0,
        slots: Vec::new(),
    };
    let var = u.parse_value(env)?;
    if u.pos != u.input.len() {
        return Err(u.error(UnserializeErrorKind::TrailingData));
    }
    Ok(var.get())
}

struct Unserializer<'a> {
    input: &'a [u8],
    pos: usize,
    /// Cell per decoded value, 1-based by position, for `r:`/`R:`.
    slots: Vec<Var>,
}

impl<'a> Unserializer<'a> {
    fn error(&self, kind: UnserializeErrorKind) -> UnserializeError {
        UnserializeError {
            offset: self.pos,
            kind,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn take(&mut self) -> Result<u8, UnserializeError> {
        let b = self
            .peek()
            .ok_or_else(|| self.error(UnserializeErrorKind::UnexpectedEnd))?;
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, byte: u8) -> Result<(), UnserializeError> {
        if self.take()? != byte {
            self.pos -= 1;
            return Err(self.error(UnserializeErrorKind::BadToken));
        }
        Ok(())
    }

    fn expect_bytes(&mut self, bytes: &[u8]) -> Result<(), UnserializeError> {
        for &b in bytes {
            self.expect(b)?;
        }
        Ok(())
    }

    /// Decimal run up to the next `terminator`.
    fn read_int_until(&mut self, terminator: u8) -> Result<i64, UnserializeError> {
        let start = self.pos;
        if self.peek() == Some(b'-') || self.peek() == Some(b'+') {
            self.pos += 1;
        }
        while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error(UnserializeErrorKind::BadToken));
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error(UnserializeErrorKind::BadToken))?;
        let value = text
            .parse::<i64>()
            .map_err(|_| self.error(UnserializeErrorKind::BadToken))?;
        self.expect(terminator)?;
        Ok(value)
    }

    fn read_length(&mut self, terminator: u8) -> Result<usize, UnserializeError> {
        let n = self.read_int_until(terminator)?;
        if n < 0 {
            return Err(self.error(UnserializeErrorKind::BadLength));
        }
        let n = n as usize;
        // A length prefix can never exceed what is left of the input.
        if n > self.input.len() - self.pos {
            return Err(self.error(UnserializeErrorKind::BadLength));
        }
        Ok(n)
    }

    /// `len:"bytes"` with the leading `s:` already consumed.
    fn read_string_body(&mut self) -> Result<Vec<u8>, UnserializeError> {
        let len = self.read_length(b':')?;
        self.expect(b'"')?;
        if self.input.len() - self.pos < len {
            return Err(self.error(UnserializeErrorKind::UnexpectedEnd));
        }
        let bytes = self.input[self.pos..self.pos + len].to_vec();
        self.pos += len;
        self.expect(b'"')?;
        Ok(bytes)
    }

    fn read_double(&mut self) -> Result<f64, UnserializeError> {
        let start = self.pos;
        while self.peek().map(|b| b != b';').unwrap_or(false) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error(UnserializeErrorKind::BadToken))?;
        let value = match text {
            "NAN" => f64::NAN,
            "INF" => f64::INFINITY,
            "-INF" => f64::NEG_INFINITY,
            other => other
                .parse::<f64>()
                .map_err(|_| self.error(UnserializeErrorKind::BadToken))?,
        };
        self.expect(b';')?;
        Ok(value)
    }

    /// An array key: `i:..;` or `s:..:"..";`, not slot-counted.
    fn parse_key(&mut self) -> Result<ArrayKey, UnserializeError> {
        match self.take()? {
            b'i' => {
                self.expect(b':')?;
                Ok(ArrayKey::Int(self.read_int_until(b';')?))
            }
            b's' => {
                self.expect(b':')?;
                let bytes = self.read_string_body()?;
                self.expect(b';')?;
                Ok(ArrayKey::from_bytes(&bytes))
            }
            _ => {
                self.pos -= 1;
                Err(self.error(UnserializeErrorKind::BadToken))
            }
        }
    }

    /// One value. The cell is pushed to the slot list before children are
    /// parsed, which is what makes nested back-references line up.
    fn parse_value(&mut self, env: &mut Env) -> Result<Var, UnserializeError> {
        let var = Var::new(Value::Null);
        self.slots.push(var.clone());

        match self.take()? {
            b'N' => {
                self.expect(b';')?;
            }
            b'b' => {
                self.expect(b':')?;
                let b = match self.take()? {
                    b'0' => false,
                    b'1' => true,
                    _ => {
                        self.pos -= 1;
                        return Err(self.error(UnserializeErrorKind::BadToken));
                    }
                };
                self.expect(b';')?;
                var.set(Value::Bool(b));
            }
            b'i' => {
                self.expect(b':')?;
                var.set(Value::Int(self.read_int_until(b';')?));
            }
            b'd' => {
                self.expect(b':')?;
                var.set(Value::Float(self.read_double()?));
            }
            b's' => {
                self.expect(b':')?;
                let bytes = self.read_string_body()?;
                self.expect(b';')?;
                var.set(Value::String(StringValue::binary(bytes)));
            }
            b'a' => {
                self.expect(b':')?;
                let count = self.read_length(b':')?;
                self.expect(b'{')?;
                let mut arr = ArrayValue::new();
                for _ in 0..count {
                    let key = self.parse_key()?;
                    let element = self.parse_value(env)?;
                    arr.insert_slot(key, Slot::Ref(element));
                }
                self.expect(b'}')?;
                var.set(Value::Array(arr));
            }
            b'O' => {
                self.expect(b':')?;
                let name_len = self.read_length(b':')?;
                self.expect(b'"')?;
                if self.input.len() - self.pos < name_len {
                    return Err(self.error(UnserializeErrorKind::UnexpectedEnd));
                }
                let name =
                    String::from_utf8_lossy(&self.input[self.pos..self.pos + name_len]).into_owned();
                self.pos += name_len;
                self.expect_bytes(b"\":")?;
                let count = self.read_length(b':')?;
                self.expect(b'{')?;

                let object = create_object(env, &name).map_err(|_| UnserializeError {
                    offset: self.pos,
                    kind: UnserializeErrorKind::UnknownClass(name.clone()),
                })?;
                var.set(Value::Object(object.clone()));

                for _ in 0..count {
                    let key = self.parse_key()?;
                    let wire = match &key {
                        ArrayKey::Str(s) => s.to_vec(),
                        ArrayKey::Int(i) => i.to_string().into_bytes(),
                    };
                    let (visibility, declared_name, plain) = unmangle(&wire);
                    let declared_in = declared_name
                        .and_then(|c| {
                            let c = String::from_utf8_lossy(c);
                            env.classes.lookup(&fold_case(&c)).map(|r| r.id)
                        })
                        .unwrap_or_else(|| object.class_id());
                    let symbol = env.intern(&String::from_utf8_lossy(plain));
                    let element = self.parse_value(env)?;
                    object.insert_raw(symbol, visibility, declared_in, Slot::Ref(element));
                }
                self.expect(b'}')?;

                let wakeup = env.classes.get(object.class_id()).magic.wakeup.clone();
                if let Some(entry) = wakeup {
                    env.push_class_scope(entry.declared_in);
                    let result = (entry.handler)(env, Some(&object), &[]);
                    env.pop_class_scope();
                    if result.is_err() {
                        return Err(self.error(UnserializeErrorKind::BadToken));
                    }
                }
            }
            b'r' => {
                self.expect(b':')?;
                let target = self.resolve_backref()?;
                var.set(target.get());
            }
            b'R' => {
                self.expect(b':')?;
                let target = self.resolve_backref()?;
                target.set_referenced();
                // This slot is the target cell itself, not a copy.
                let last = self.slots.len() - 1;
                self.slots[last] = target.clone();
                return Ok(target);
            }
            _ => {
                self.pos -= 1;
                return Err(self.error(UnserializeErrorKind::BadToken));
            }
        }
        Ok(var)
    }

    fn resolve_backref(&mut self) -> Result<Var, UnserializeError> {
        let index = self.read_int_until(b';')?;
        // The slot being decoded is already in the list; it is not a
        // legal target for itself.
        if index < 1 || index as usize >= self.slots.len() {
            return Err(self.error(UnserializeErrorKind::BadBackRef));
        }
        Ok(self.slots[index as usize - 1].clone())
    }
}
