//! Reference cells.
//!
//! A `Var` is the unit of PHP reference aliasing: a shared mutable cell
//! holding exactly one value. Two variable slots alias each other exactly
//! when they hold the same `Var` (pointer identity). Copy-on-write never
//! duplicates a `Var`; only its handle is copied.
//!
//! The `referenced` flag records that the cell has actually been aliased
//! (`$b = &$a`, `&$a[0]` as an argument, ...). Container copies collapse
//! unreferenced cells back to inline values, which is what keeps COW
//! sharing and reference sharing from being conflated.
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_variables.c - reference handling

use crate::core::value::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub struct Var {
    inner: Rc<VarInner>,
}

struct VarInner {
    value: RefCell<Value>,
    referenced: Cell<bool>,
}

impl Var {
    pub fn new(value: Value) -> Self {
        Var {
            inner: Rc::new(VarInner {
                // A cell never nests a reference; aliasing a reference
                // aliases the same cell instead.
                value: RefCell::new(value.to_value()),
                referenced: Cell::new(false),
            }),
        }
    }

    /// Read the current value (a copy; containers copy as COW handles).
    pub fn get(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Dereference, same as `get`. Named for the binding protocol.
    pub fn to_value(&self) -> Value {
        self.get()
    }

    /// Overwrite the cell. Writing a reference writes its target value.
    pub fn set(&self, value: Value) {
        *self.inner.value.borrow_mut() = value.to_value();
    }

    /// Run `f` against the stored value without copying it.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Run `f` against the stored value with mutable access. This is how
    /// in-place container mutation through a reference happens.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(&mut self.inner.value.borrow_mut())
    }

    /// Promote to a real reference. Idempotent: the same cell is returned,
    /// now flagged as aliased.
    pub fn to_ref_var(&self) -> Var {
        self.inner.referenced.set(true);
        self.clone()
    }

    /// Wrap as a by-reference argument value.
    pub fn to_ref_value(&self) -> Value {
        Value::Ref(self.to_ref_var())
    }

    pub fn is_referenced(&self) -> bool {
        self.inner.referenced.get()
    }

    pub fn set_referenced(&self) {
        self.inner.referenced.set(true);
    }

    /// Identity of the cell, for visited maps.
    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn ptr_eq(a: &Var, b: &Var) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("value", &*self.inner.value.borrow())
            .field("referenced", &self.inner.referenced.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliased_cells_share_writes() {
        let a = Var::new(Value::Int(1));
        let b = a.to_ref_var();
        b.set(Value::Int(2));
        assert!(matches!(a.get(), Value::Int(2)));
        assert!(a.is_referenced());
        assert!(Var::ptr_eq(&a, &b));
    }

    #[test]
    fn fresh_cell_is_not_referenced() {
        let v = Var::new(Value::Int(5));
        assert!(!v.is_referenced());
    }

    #[test]
    fn storing_a_reference_stores_its_target() {
        let target = Var::new(Value::Int(7));
        let v = Var::new(Value::Ref(target.to_ref_var()));
        assert!(matches!(v.get(), Value::Int(7)));
    }
}
