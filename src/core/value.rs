//! The polymorphic PHP value.
//!
//! `Value` is a closed tagged variant over the fixed PHP kinds. Scalars are
//! immutable; arrays are value types with copy-on-write sharing; objects
//! and resources are handles; `Ref` marks a by-reference binding at a call
//! or storage boundary.
//!
//! ## PHP Semantics
//!
//! Every coercion here follows PHP's weak typing rules: numeric strings
//! convert through the lenient scanner, `"0"` and `""` are falsy, arrays
//! are truthy when non-empty, objects are always truthy. `Unset` is the
//! distinguished "no such key/field" sentinel; it behaves like null but is
//! distinguishable for isset-style checks.
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_operators.c - convert_to_* family

use crate::core::array::{ArrayKey, ArrayValue};
use crate::core::string::{double_to_long, Num, StringValue};
use crate::core::var::Var;
use crate::runtime::object::ObjectValue;
use crate::runtime::resource::ResourceRef;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    /// Result of reading a key or field that does not exist.
    Unset,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(StringValue),
    Array(ArrayValue),
    Object(ObjectValue),
    Resource(ResourceRef),
    /// A by-reference binding to a shared cell.
    Ref(Var),
}

impl Value {
    pub fn string(s: impl Into<Vec<u8>>) -> Value {
        Value::String(StringValue::binary(s))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Unset => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Resource(_) => "resource",
            Value::Ref(v) => v.with(|inner| inner.type_name()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.deref(), Value::Null | Value::Unset)
    }

    /// False only for the unset sentinel; what `isset()` asks.
    pub fn is_set(&self) -> bool {
        !matches!(self.deref(), Value::Unset)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.deref(), Value::Bool(_))
    }

    pub fn is_long(&self) -> bool {
        matches!(self.deref(), Value::Int(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self.deref(), Value::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.deref(), Value::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.deref(), Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.deref(), Value::Object(_))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self.deref(), Value::Resource(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.deref(),
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// `is_numeric()`: an int, a float, or a fully numeric string.
    pub fn is_numeric(&self) -> bool {
        match self.deref() {
            Value::Int(_) | Value::Float(_) => true,
            Value::String(s) => s.is_numeric(),
            _ => false,
        }
    }

    /// Dereference one level: a `Ref` reads its cell, everything else is
    /// returned as-is. Returns an owned value because the cell's content
    /// cannot be borrowed out.
    pub fn deref(&self) -> Value {
        match self {
            Value::Ref(v) => v.get(),
            other => other.clone(),
        }
    }

    /// Conversion to bool.
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zend_is_true
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null | Value::Unset => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => {
                let bytes = s.as_bytes();
                !(bytes.is_empty() || bytes == b"0")
            }
            Value::Array(a) => !a.is_empty(),
            Value::Object(_) => true,
            Value::Resource(_) => true,
            Value::Ref(v) => v.with(|inner| inner.to_bool()),
        }
    }

    /// Conversion to int. Silent best-effort; arithmetic goes through the
    /// env-aware path in `core::arith` so that bad coercions can warn.
    pub fn to_long(&self) -> i64 {
        match self {
            Value::Null | Value::Unset => 0,
            Value::Bool(b) => *b as i64,
            Value::Int(i) => *i,
            Value::Float(f) => double_to_long(*f),
            Value::String(s) => s.to_long(),
            Value::Array(a) => !a.is_empty() as i64,
            Value::Object(_) => 1,
            Value::Resource(r) => r.id() as i64,
            Value::Ref(v) => v.with(|inner| inner.to_long()),
        }
    }

    pub fn to_double(&self) -> f64 {
        match self {
            Value::Null | Value::Unset => 0.0,
            Value::Bool(b) => *b as i64 as f64,
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::String(s) => s.to_double(),
            Value::Array(a) => !a.is_empty() as i64 as f64,
            Value::Object(_) => 1.0,
            Value::Resource(r) => r.id() as f64,
            Value::Ref(v) => v.with(|inner| inner.to_double()),
        }
    }

    /// Printable form.
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zend_make_printable_zval
    pub fn to_string_value(&self) -> StringValue {
        match self {
            Value::Null | Value::Unset => StringValue::empty(),
            Value::Bool(b) => {
                if *b {
                    StringValue::from("1")
                } else {
                    StringValue::empty()
                }
            }
            Value::Int(i) => StringValue::binary(i.to_string().into_bytes()),
            Value::Float(f) => StringValue::binary(format_double(*f).into_bytes()),
            Value::String(s) => s.clone(),
            Value::Array(_) => StringValue::from("Array"),
            // Objects without a __toString hook; the hook path lives in the
            // object runtime where an Env is available.
            Value::Object(_) => StringValue::from("Object"),
            Value::Resource(r) => {
                StringValue::binary(format!("Resource id #{}", r.id()).into_bytes())
            }
            Value::Ref(v) => v.with(|inner| inner.to_string_value()),
        }
    }

    /// Canonicalize into an array key. Bools and floats collapse to ints,
    /// null becomes the empty string, numeric strings become ints.
    /// Reference: $PHP_SRC_PATH/Zend/zend_hash.h - key normalization
    pub fn to_key(&self) -> ArrayKey {
        match self {
            Value::Null | Value::Unset => ArrayKey::Str(Rc::new(Vec::new())),
            Value::Bool(b) => ArrayKey::Int(*b as i64),
            Value::Int(i) => ArrayKey::Int(*i),
            Value::Float(f) => ArrayKey::Int(double_to_long(*f)),
            Value::String(s) => ArrayKey::from_bytes(s.as_bytes()),
            Value::Resource(r) => ArrayKey::Int(r.id() as i64),
            Value::Ref(v) => v.with(|inner| inner.to_key()),
            // Arrays and objects are illegal keys; callers report and skip.
            Value::Array(_) | Value::Object(_) => ArrayKey::Int(0),
        }
    }

    /// By-value read through any reference.
    pub fn to_value(&self) -> Value {
        match self {
            Value::Ref(v) => v.get(),
            other => other.clone(),
        }
    }

    /// By-value argument binding: copies scalars, COW-copies arrays,
    /// shares object handles, drops reference wrappers.
    pub fn to_arg_value(&self) -> Value {
        self.to_value()
    }

    /// By-reference argument binding: keep an existing reference, wrap
    /// anything else unchanged (the slot-level promotion happens in the
    /// container that owns the value).
    pub fn to_ref_value(&self) -> Value {
        match self {
            Value::Ref(v) => Value::Ref(v.to_ref_var()),
            other => other.clone(),
        }
    }

    /// Materialize a storage cell for this value. An existing reference
    /// yields its own cell.
    pub fn to_var(&self) -> Var {
        match self {
            Value::Ref(v) => v.clone(),
            other => Var::new(other.clone()),
        }
    }

    /// Like `to_var`, but the resulting cell is flagged as aliased.
    pub fn to_ref_var(&self) -> Var {
        let var = self.to_var();
        var.set_referenced();
        var
    }
}

/// PHP's float-to-text rule: whole finite floats print without a fraction,
/// everything else prints the shortest round-trip form.
pub fn format_double(f: f64) -> String {
    if f.is_nan() {
        "NAN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else if f == f.trunc() && f.abs() < 1e15 {
        format!("{:.0}", f)
    } else {
        format!("{}", f)
    }
}

impl PartialEq for Value {
    /// Strict (`===`) equality, matching what identity tests want. Loose
    /// `==` lives in `core::compare::loose_eq`.
    fn eq(&self, other: &Self) -> bool {
        crate::core::compare::strict_eq(self, other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(StringValue::from(s))
    }
}

impl From<Num> for Value {
    fn from(n: Num) -> Value {
        match n {
            Num::Int(i) => Value::Int(i),
            Num::Float(f) => Value::Float(f),
        }
    }
}
