//! Loose equality, strict equality and ordering.
//!
//! ## PHP Semantics
//!
//! This is the mixed-type comparison table, pinned to PHP 5.6 (pre-PHP7
//! numeric-string rules):
//!
//! - bool or null on either side compares as booleans (except null vs
//!   string, which compares null as `""`)
//! - a string against a number always compares numerically
//! - two strings compare numerically when both are fully numeric,
//!   byte-lexicographically otherwise
//! - arrays compare by size first, then pairwise over the left side's
//!   keys; a key missing on the right makes the pair incomparable
//! - objects compare pairwise by property when of the same class,
//!   identically only to themselves otherwise
//!
//! `compare` returns `Option<Ordering>`: `None` is the incomparable
//! sentinel (mismatched array keys, NaN). Every `<`/`<=`-style operator
//! built on it treats `None` as false, which matches PHP.
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_operators.c - compare_function,
//! is_equal_function, is_identical_function

use crate::core::value::Value;
use crate::runtime::object::ObjectValue;
use std::cmp::Ordering;

/// PHP `==`.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if let Value::Ref(v) = a {
        return v.with(|inner| loose_eq(inner, b));
    }
    if let Value::Ref(v) = b {
        return v.with(|inner| loose_eq(a, inner));
    }

    match (a, b) {
        (Value::Null | Value::Unset, Value::Null | Value::Unset) => true,
        // null against a string compares null as "".
        (Value::Null | Value::Unset, Value::String(s))
        | (Value::String(s), Value::Null | Value::Unset) => s.is_empty(),
        (Value::Bool(_) | Value::Null | Value::Unset, _)
        | (_, Value::Bool(_) | Value::Null | Value::Unset) => a.to_bool() == b.to_bool(),

        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Float(y)) => (*x as f64) == *y,
        (Value::Float(x), Value::Int(y)) => *x == (*y as f64),

        (Value::String(x), Value::String(y)) => {
            let sx = x.scan_numeric();
            let sy = y.scan_numeric();
            if sx.matched && sx.fully_numeric && sy.matched && sy.fully_numeric {
                sx.value.to_double() == sy.value.to_double()
            } else {
                x == y
            }
        }
        // String against a number: the string is coerced, numeric or not.
        (Value::String(_), Value::Int(_) | Value::Float(_))
        | (Value::Int(_) | Value::Float(_), Value::String(_)) => a.to_double() == b.to_double(),

        (Value::Array(x), Value::Array(y)) => {
            // Same key/value pairs, order-insensitive.
            if x.len() != y.len() {
                return false;
            }
            x.entries().all(|(key, slot)| match y.get_opt(key) {
                Some(other) => loose_eq(&slot.get(), &other),
                None => false,
            })
        }
        (Value::Object(x), Value::Object(y)) => {
            ObjectValue::ptr_eq(x, y)
                || (x.class_id() == y.class_id() && ObjectValue::props_eq(x, y, false))
        }
        (Value::Resource(x), Value::Resource(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// PHP `===`: same type, same value; arrays must match in order and type;
/// objects must be the same instance.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    if let Value::Ref(v) = a {
        return v.with(|inner| strict_eq(inner, b));
    }
    if let Value::Ref(v) = b {
        return v.with(|inner| strict_eq(a, inner));
    }

    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Unset, Value::Unset) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        // Flavor is a host detail, not a PHP type: equal text is identical.
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            if x.len() != y.len() {
                return false;
            }
            x.entries()
                .zip(y.entries())
                .all(|((ka, sa), (kb, sb))| ka == kb && strict_eq(&sa.get(), &sb.get()))
        }
        (Value::Object(x), Value::Object(y)) => ObjectValue::ptr_eq(x, y),
        (Value::Resource(x), Value::Resource(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// Three-way comparison. `None` means incomparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let Value::Ref(v) = a {
        return v.with(|inner| compare(inner, b));
    }
    if let Value::Ref(v) = b {
        return v.with(|inner| compare(a, inner));
    }

    match (a, b) {
        (Value::Null | Value::Unset, Value::String(s)) => {
            Some((b"" as &[u8]).cmp(s.as_bytes()))
        }
        (Value::String(s), Value::Null | Value::Unset) => {
            Some(s.as_bytes().cmp(b"" as &[u8]))
        }
        (Value::Bool(_) | Value::Null | Value::Unset, _)
        | (_, Value::Bool(_) | Value::Null | Value::Unset) => {
            Some(a.to_bool().cmp(&b.to_bool()))
        }

        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            a.to_double().partial_cmp(&b.to_double())
        }

        (Value::String(x), Value::String(y)) => {
            let sx = x.scan_numeric();
            let sy = y.scan_numeric();
            if sx.matched && sx.fully_numeric && sy.matched && sy.fully_numeric {
                sx.value.to_double().partial_cmp(&sy.value.to_double())
            } else {
                Some(x.cmp_with(y))
            }
        }
        (Value::String(_), Value::Int(_) | Value::Float(_))
        | (Value::Int(_) | Value::Float(_), Value::String(_)) => {
            a.to_double().partial_cmp(&b.to_double())
        }

        (Value::Object(x), Value::Object(y)) => {
            if ObjectValue::ptr_eq(x, y) {
                Some(Ordering::Equal)
            } else if x.class_id() == y.class_id() {
                if ObjectValue::props_eq(x, y, false) {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            } else {
                None
            }
        }
        // An object is greater than anything else, arrays included.
        (Value::Object(_), _) => Some(Ordering::Greater),
        (_, Value::Object(_)) => Some(Ordering::Less),

        (Value::Array(x), Value::Array(y)) => {
            match x.len().cmp(&y.len()) {
                Ordering::Equal => {}
                other => return Some(other),
            }
            for (key, slot) in x.entries() {
                match y.get_opt(key) {
                    Some(other) => match compare(&slot.get(), &other)? {
                        Ordering::Equal => continue,
                        decided => return Some(decided),
                    },
                    // Key missing on one side: the arrays are incomparable.
                    None => return None,
                }
            }
            Some(Ordering::Equal)
        }
        // An array is greater than any remaining scalar.
        (Value::Array(_), _) => Some(Ordering::Greater),
        (_, Value::Array(_)) => Some(Ordering::Less),

        (Value::Resource(x), Value::Resource(y)) => Some(x.id().cmp(&y.id())),
        (Value::Resource(_), _) | (_, Value::Resource(_)) => {
            a.to_double().partial_cmp(&b.to_double())
        }

        (Value::Ref(_), _) | (_, Value::Ref(_)) => unreachable!("refs dereferenced above"),
    }
}

/// Convenience predicates over `compare`, all false on the incomparable
/// sentinel.
pub fn lt(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Less)
}

pub fn le(a: &Value, b: &Value) -> bool {
    matches!(compare(a, b), Some(Ordering::Less | Ordering::Equal))
}

pub fn gt(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Greater)
}

pub fn ge(a: &Value, b: &Value) -> bool {
    matches!(compare(a, b), Some(Ordering::Greater | Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::array::ArrayValue;
    use crate::core::string::StringValue as S;

    #[test]
    fn numeric_string_vs_int_compares_numerically() {
        assert_eq!(
            compare(&Value::from("10"), &Value::Int(9)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare(&Value::Int(9), &Value::from("10")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn numeric_strings_compare_numerically() {
        assert!(loose_eq(&Value::from("1e1"), &Value::from("10")));
        assert!(loose_eq(&Value::from("01"), &Value::from("1")));
        assert!(!strict_eq(&Value::from("01"), &Value::from("1")));
        assert_eq!(
            compare(&Value::from("apple"), &Value::from("banana")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn bool_and_null_collapse_to_bool() {
        assert!(loose_eq(&Value::Null, &Value::Bool(false)));
        assert!(loose_eq(&Value::Bool(true), &Value::Int(7)));
        assert!(loose_eq(&Value::Null, &Value::Int(0)));
        assert!(!loose_eq(&Value::Null, &Value::from("0")));
        assert!(loose_eq(&Value::Null, &Value::from("")));
    }

    #[test]
    fn non_numeric_string_coerces_against_number() {
        // Pre-PHP7 rule: the string side always becomes a number.
        assert!(loose_eq(&Value::from("abc"), &Value::Int(0)));
        assert!(!loose_eq(&Value::from("abc"), &Value::Int(1)));
    }

    #[test]
    fn strict_requires_same_type() {
        assert!(!strict_eq(&Value::from("42"), &Value::Int(42)));
        assert!(!strict_eq(&Value::Int(1), &Value::Float(1.0)));
        assert!(strict_eq(&Value::Int(1), &Value::Int(1)));
    }

    #[test]
    fn unicode_and_binary_text_equal() {
        let a = Value::String(S::unicode("abc"));
        let b = Value::String(S::binary(b"abc".to_vec()));
        assert!(strict_eq(&a, &b));
    }

    #[test]
    fn array_compare_by_size_then_pairwise() {
        let mut a = ArrayValue::new();
        a.push(Value::Int(1));
        let mut b = ArrayValue::new();
        b.push(Value::Int(1));
        b.push(Value::Int(2));
        assert_eq!(
            compare(&Value::Array(a.clone()), &Value::Array(b.clone())),
            Some(Ordering::Less)
        );

        let mut c = ArrayValue::new();
        c.push(Value::Int(2));
        assert_eq!(
            compare(&Value::Array(a), &Value::Array(c)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn mismatched_keys_are_incomparable() {
        let mut a = ArrayValue::new();
        a.put(Value::from("x").to_key(), Value::Int(1));
        let mut b = ArrayValue::new();
        b.put(Value::from("y").to_key(), Value::Int(1));
        assert_eq!(compare(&Value::Array(a.clone()), &Value::Array(b.clone())), None);
        assert!(!lt(&Value::Array(a.clone()), &Value::Array(b.clone())));
        assert!(!gt(&Value::Array(a), &Value::Array(b)));
    }

    #[test]
    fn loose_array_eq_ignores_order() {
        let mut a = ArrayValue::new();
        a.put(Value::from("x").to_key(), Value::Int(1));
        a.put(Value::from("y").to_key(), Value::Int(2));
        let mut b = ArrayValue::new();
        b.put(Value::from("y").to_key(), Value::Int(2));
        b.put(Value::from("x").to_key(), Value::Int(1));
        assert!(loose_eq(&Value::Array(a.clone()), &Value::Array(b.clone())));
        assert!(!strict_eq(&Value::Array(a), &Value::Array(b)));
    }

    #[test]
    fn nan_is_incomparable() {
        assert_eq!(compare(&Value::Float(f64::NAN), &Value::Float(1.0)), None);
        assert!(!loose_eq(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
    }
}
