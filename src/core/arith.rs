//! Arithmetic over weakly typed operands.
//!
//! ## PHP Semantics
//!
//! Operands are reduced to a number through the lenient scanner before the
//! operation runs. `+` on two arrays is the union operator instead. Integer
//! results that would overflow are promoted to floats. Division prefers an
//! integer result when both operands are integers and divide evenly.
//! Division or modulo by zero raises a warning and yields `false`.
//!
//! All entry points take the environment so coercion problems and zero
//! divisors can be reported through the diagnostics sink.
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_operators.c - add_function et al.

use crate::core::string::Num;
use crate::core::value::Value;
use crate::runtime::env::{Env, RuntimeError};

/// Reduce an operand to a number. Strings go through the prefix scanner;
/// a string with no numeric prefix at all counts as 0 after a warning.
/// Arrays and objects are not numbers.
pub fn to_number(env: &mut Env, value: &Value) -> Result<Num, RuntimeError> {
    match value.deref() {
        Value::Null | Value::Unset => Ok(Num::Int(0)),
        Value::Bool(b) => Ok(Num::Int(b as i64)),
        Value::Int(i) => Ok(Num::Int(i)),
        Value::Float(f) => Ok(Num::Float(f)),
        Value::String(s) => {
            let scan = s.scan_numeric();
            if !scan.matched {
                env.warning("non-numeric string used as number");
            }
            Ok(scan.value)
        }
        Value::Resource(r) => Ok(Num::Int(r.id() as i64)),
        other @ (Value::Array(_) | Value::Object(_)) => {
            Err(RuntimeError::UnsupportedOperand {
                type_name: other.type_name(),
            })
        }
        Value::Ref(_) => unreachable!("deref() strips references"),
    }
}

/// `+`: numeric addition, or key-union when both sides are arrays.
pub fn add(env: &mut Env, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    if let (Value::Array(a), Value::Array(b)) = (&lhs.deref(), &rhs.deref()) {
        return Ok(Value::Array(a.union(b)));
    }
    let (l, r) = (to_number(env, lhs)?, to_number(env, rhs)?);
    Ok(match (l, r) {
        (Num::Int(x), Num::Int(y)) => match x.checked_add(y) {
            Some(sum) => Value::Int(sum),
            None => Value::Float(x as f64 + y as f64),
        },
        (l, r) => Value::Float(l.to_double() + r.to_double()),
    })
}

pub fn sub(env: &mut Env, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let (l, r) = (to_number(env, lhs)?, to_number(env, rhs)?);
    Ok(match (l, r) {
        (Num::Int(x), Num::Int(y)) => match x.checked_sub(y) {
            Some(diff) => Value::Int(diff),
            None => Value::Float(x as f64 - y as f64),
        },
        (l, r) => Value::Float(l.to_double() - r.to_double()),
    })
}

pub fn mul(env: &mut Env, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let (l, r) = (to_number(env, lhs)?, to_number(env, rhs)?);
    Ok(match (l, r) {
        (Num::Int(x), Num::Int(y)) => match x.checked_mul(y) {
            Some(prod) => Value::Int(prod),
            None => Value::Float(x as f64 * y as f64),
        },
        (l, r) => Value::Float(l.to_double() * r.to_double()),
    })
}

/// `/`: integer when both operands are integers and divide evenly, float
/// otherwise. Zero divisor warns and yields `false`.
pub fn div(env: &mut Env, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let (l, r) = (to_number(env, lhs)?, to_number(env, rhs)?);
    if r.to_double() == 0.0 {
        env.warning("Division by zero");
        return Ok(Value::Bool(false));
    }
    Ok(match (l, r) {
        // checked_rem sidesteps the i64::MIN / -1 overflow pair.
        (Num::Int(x), Num::Int(y)) if x.checked_rem(y) == Some(0) => match x.checked_div(y) {
            Some(q) => Value::Int(q),
            None => Value::Float(x as f64 / y as f64),
        },
        (l, r) => Value::Float(l.to_double() / r.to_double()),
    })
}

/// `%`: integer modulo after truncation. Result takes the dividend's sign.
pub fn rem(env: &mut Env, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let (l, r) = (to_number(env, lhs)?, to_number(env, rhs)?);
    let (x, y) = (l.to_long(), r.to_long());
    if y == 0 {
        env.warning("Division by zero");
        return Ok(Value::Bool(false));
    }
    if y == -1 {
        // i64::MIN % -1 overflows in hardware; PHP answers 0.
        return Ok(Value::Int(0));
    }
    Ok(Value::Int(x % y))
}

/// Unary `-`.
pub fn neg(env: &mut Env, value: &Value) -> Result<Value, RuntimeError> {
    match to_number(env, value)? {
        Num::Int(i) => Ok(match i.checked_neg() {
            Some(n) => Value::Int(n),
            None => Value::Float(-(i as f64)),
        }),
        Num::Float(f) => Ok(Value::Float(-f)),
    }
}
