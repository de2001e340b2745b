//! The mixed-type comparison table and weak-typed arithmetic, end to end.

use php_runtime::core::arith;
use php_runtime::core::compare::{compare, ge, gt, loose_eq, lt, strict_eq};
use php_runtime::runtime::class::ClassDecl;
use php_runtime::runtime::object::create_object;
use php_runtime::{ArrayValue, Env, ErrorLevel, Value};
use std::cmp::Ordering;

#[test]
fn classic_loose_equality_table() {
    // The rows PHP 5 quizzes are made of.
    assert!(loose_eq(&Value::Int(0), &Value::string("a")));
    assert!(loose_eq(&Value::string("1"), &Value::string("01")));
    assert!(loose_eq(&Value::string("10"), &Value::string("1e1")));
    assert!(loose_eq(&Value::Int(100), &Value::string("1e2")));
    assert!(loose_eq(&Value::Bool(false), &Value::string("0")));
    assert!(loose_eq(&Value::Null, &Value::Bool(false)));
    assert!(!loose_eq(&Value::string("abc"), &Value::string("0")));
}

#[test]
fn strict_never_coerces() {
    assert!(!strict_eq(&Value::Int(0), &Value::string("a")));
    assert!(!strict_eq(&Value::string("1"), &Value::string("01")));
    assert!(!strict_eq(&Value::Bool(false), &Value::Null));
    assert!(strict_eq(&Value::string("01"), &Value::string("01")));
}

#[test]
fn ordering_crosses_types() {
    assert!(lt(&Value::Null, &Value::Int(1)));
    assert!(gt(&Value::string("10"), &Value::Int(9)));
    assert!(ge(&Value::Float(2.0), &Value::Int(2)));
    // Non-empty array beats any scalar; object beats the array.
    let arr = Value::Array(ArrayValue::from_values([Value::Int(1)]));
    assert!(gt(&arr, &Value::Int(i64::MAX)));

    let mut env = Env::new();
    env.classes
        .define(ClassDecl::new("Any"), &mut env.interner)
        .unwrap();
    let obj = Value::Object(create_object(&mut env, "Any").unwrap());
    assert!(gt(&obj, &arr));
    assert_eq!(compare(&arr, &obj), Some(Ordering::Less));
}

#[test]
fn weak_arithmetic_follows_the_scanner() {
    let mut env = Env::new();
    // "10 apples" + 5 == 15
    assert_eq!(
        arith::add(&mut env, &Value::string("10 apples"), &Value::Int(5)).unwrap(),
        Value::Int(15)
    );
    // "1.5" + "1.5" == 3.0
    assert_eq!(
        arith::add(&mut env, &Value::string("1.5"), &Value::string("1.5")).unwrap(),
        Value::Float(3.0)
    );
    // true + true == 2
    assert_eq!(
        arith::add(&mut env, &Value::Bool(true), &Value::Bool(true)).unwrap(),
        Value::Int(2)
    );
}

#[test]
fn division_rules() {
    let mut env = Env::new();
    assert_eq!(
        arith::div(&mut env, &Value::Int(10), &Value::Int(5)).unwrap(),
        Value::Int(2)
    );
    assert_eq!(
        arith::div(&mut env, &Value::Int(10), &Value::Int(4)).unwrap(),
        Value::Float(2.5)
    );
    assert_eq!(
        arith::div(&mut env, &Value::Int(1), &Value::Int(0)).unwrap(),
        Value::Bool(false)
    );
    assert!(env
        .diagnostics()
        .iter()
        .any(|d| d.level == ErrorLevel::Warning && d.message.contains("Division by zero")));
}

#[test]
fn comparisons_drive_sorting() {
    // sort(array("12", "101", "9")) orders numerically.
    let mut a = ArrayValue::from_values([
        Value::string("12"),
        Value::string("101"),
        Value::string("9"),
    ]);
    a.sort(
        |x, y| compare(x, y).unwrap_or(Ordering::Equal),
        true,
        false,
    );
    assert_eq!(
        a.values(),
        vec![Value::string("9"), Value::string("12"), Value::string("101")]
    );
}

#[test]
fn incomparable_pairs_answer_false_everywhere() {
    let nan = Value::Float(f64::NAN);
    assert!(!lt(&nan, &Value::Float(1.0)));
    assert!(!gt(&nan, &Value::Float(1.0)));
    assert!(!loose_eq(&nan, &nan));
    assert!(!strict_eq(&nan, &nan));
}
