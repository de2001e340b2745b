//! Opaque host resources.
//!
//! A resource is a numbered handle around host state (a stream, a
//! connection, ...). The runtime only needs identity, the id, and a type
//! name; everything else is behind the trait, downcast by the extension
//! that created it.

use crate::runtime::env::RuntimeError;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub trait ResourceValue: Any {
    /// Resource type label, as `get_resource_type()` reports it.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    /// Reposition to the start. Hosts that cannot seek keep the default.
    fn rewind(&mut self) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unsupported {
            operation: format!("rewind on {} resource", self.type_name()),
        })
    }
}

thread_local! {
    static NEXT_RESOURCE_ID: Cell<u32> = const { Cell::new(1) };
}

/// A cloneable handle to a registered resource.
#[derive(Clone)]
pub struct ResourceRef {
    id: u32,
    inner: Rc<RefCell<dyn ResourceValue>>,
}

impl ResourceRef {
    pub fn new(resource: impl ResourceValue + 'static) -> Self {
        let id = NEXT_RESOURCE_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        ResourceRef {
            id,
            inner: Rc::new(RefCell::new(resource)),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.borrow().type_name()
    }

    pub fn ptr_eq(&self, other: &ResourceRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn rewind(&self) -> Result<(), RuntimeError> {
        self.inner.borrow_mut().rewind()
    }

    /// Borrow the underlying resource, downcast to its concrete type.
    pub fn with<T: ResourceValue, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let inner = self.inner.borrow();
        inner.as_any().downcast_ref::<T>().map(f)
    }
}

impl fmt::Debug for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource id #{} ({})", self.id, self.type_name())
    }
}
