//! The value, array and object runtime of a PHP engine.
//!
//! This crate is the data layer under a PHP interpreter: the weakly typed
//! `Value`, reference cells (`Var`), the ordered copy-on-write array
//! engine, the class/object runtime with magic-method dispatch, and the
//! `serialize()`/`unserialize()` wire codec.
//!
//! It deliberately contains no parser, no bytecode and no I/O; a host
//! embeds it by building class definitions, constructing values and
//! calling the operations here.

pub mod core;
pub mod runtime;

pub use crate::core::array::{ArrayKey, ArrayValue, Slot};
pub use crate::core::interner::{Interner, Symbol};
pub use crate::core::string::{StringBuilder, StringValue};
pub use crate::core::value::Value;
pub use crate::core::var::Var;
pub use crate::runtime::env::{Env, ErrorLevel, RuntimeError};
pub use crate::runtime::object::ObjectValue;
