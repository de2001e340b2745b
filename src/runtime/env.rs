//! The execution environment.
//!
//! `Env` owns everything one script execution shares: the class table, the
//! name interner, static property storage, the diagnostics sink, and the
//! bookkeeping that method dispatch needs (the calling-class scope stack
//! and the magic-method re-entrancy guard).
//!
//! Operations that can fail at runtime return `Result<_, RuntimeError>`;
//! recoverable conditions (undefined index, division by zero, ...) are
//! recorded as diagnostics instead and the operation yields PHP's
//! documented fallback value.

use crate::core::interner::{Interner, Symbol};
use crate::core::var::Var;
use crate::runtime::class::{ClassId, ClassTable};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Notice,
    Warning,
    Error,
}

impl ErrorLevel {
    /// Bit in the `error_reporting` mask.
    pub fn bit(self) -> u32 {
        match self {
            ErrorLevel::Notice => 1,
            ErrorLevel::Warning => 2,
            ErrorLevel::Error => 4,
        }
    }
}

/// Default `error_reporting`: everything on.
pub const REPORT_ALL: u32 = !0;

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLevel::Notice => write!(f, "Notice"),
            ErrorLevel::Warning => write!(f, "Warning"),
            ErrorLevel::Error => write!(f, "Error"),
        }
    }
}

/// One recorded runtime message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub message: String,
}

/// Unrecoverable runtime failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    UndefinedClass {
        name: String,
    },
    /// A `ClassRef` outlived a redefinition of its slot.
    StaleClassRef {
        name: String,
    },
    UndefinedMethod {
        class: String,
        method: String,
    },
    /// Visibility rejected a method call from the current scope.
    MethodAccess {
        class: String,
        method: String,
    },
    /// Visibility rejected a property access from the current scope.
    PropertyAccess {
        class: String,
        property: String,
    },
    /// Member access on a non-object value.
    NotAnObject {
        type_name: &'static str,
    },
    /// Array or object used where a number is required.
    UnsupportedOperand {
        type_name: &'static str,
    },
    /// String conversion of an object with no `__toString`.
    NoStringConversion {
        class: String,
    },
    /// Instantiation of an abstract class or interface.
    AbstractInstantiation {
        name: String,
    },
    /// A subclass declared against a final parent.
    FinalInheritance {
        class: String,
        parent: String,
    },
    /// An operation the target (typically a host resource) cannot do.
    Unsupported {
        operation: String,
    },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UndefinedClass { name } => {
                write!(f, "Class '{}' not found", name)
            }
            RuntimeError::StaleClassRef { name } => {
                write!(f, "Class '{}' was redefined; reference is stale", name)
            }
            RuntimeError::UndefinedMethod { class, method } => {
                write!(f, "Call to undefined method {}::{}()", class, method)
            }
            RuntimeError::MethodAccess { class, method } => {
                write!(f, "Call to inaccessible method {}::{}()", class, method)
            }
            RuntimeError::PropertyAccess { class, property } => {
                write!(f, "Cannot access property {}::${}", class, property)
            }
            RuntimeError::NotAnObject { type_name } => {
                write!(f, "Member access on {} value", type_name)
            }
            RuntimeError::UnsupportedOperand { type_name } => {
                write!(f, "Unsupported operand type {}", type_name)
            }
            RuntimeError::NoStringConversion { class } => {
                write!(f, "Object of class {} could not be converted to string", class)
            }
            RuntimeError::AbstractInstantiation { name } => {
                write!(f, "Cannot instantiate abstract class or interface {}", name)
            }
            RuntimeError::FinalInheritance { class, parent } => {
                write!(f, "Class {} may not inherit from final class {}", class, parent)
            }
            RuntimeError::Unsupported { operation } => {
                write!(f, "Unsupported operation: {}", operation)
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

pub struct Env {
    pub classes: ClassTable,
    pub interner: Interner,
    /// Static properties, shared across all instances of a class.
    statics: HashMap<(ClassId, Symbol), Var>,
    diagnostics: Vec<Diagnostic>,
    /// Bitmask over `ErrorLevel::bit`; masked levels are not recorded.
    error_reporting: u32,
    /// Stack of classes whose code is currently executing; visibility
    /// checks ask the top.
    class_scope: SmallVec<[ClassId; 8]>,
    /// Per-object, per-property guard against `__get`/`__set` recursion.
    magic_guard: HashSet<(usize, Symbol)>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    pub fn new() -> Self {
        Env {
            classes: ClassTable::new(),
            interner: Interner::new(),
            statics: HashMap::new(),
            diagnostics: Vec::new(),
            error_reporting: REPORT_ALL,
            class_scope: SmallVec::new(),
            magic_guard: HashSet::new(),
        }
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.interner.intern(name.as_bytes())
    }

    // -- diagnostics ----------------------------------------------------

    pub fn notice(&mut self, message: impl Into<String>) {
        self.report(ErrorLevel::Notice, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.report(ErrorLevel::Warning, message);
    }

    pub fn report(&mut self, level: ErrorLevel, message: impl Into<String>) {
        if self.error_reporting & level.bit() == 0 {
            return;
        }
        self.diagnostics.push(Diagnostic {
            level,
            message: message.into(),
        });
    }

    /// Replace the `error_reporting` mask, returning the previous one.
    pub fn set_error_reporting(&mut self, mask: u32) -> u32 {
        std::mem::replace(&mut self.error_reporting, mask)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn last_error(&self) -> Option<&Diagnostic> {
        self.diagnostics.last()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    // -- dispatch bookkeeping -------------------------------------------

    /// The class whose code is currently running, for visibility checks.
    pub fn current_scope(&self) -> Option<ClassId> {
        self.class_scope.last().copied()
    }

    pub fn push_class_scope(&mut self, class: ClassId) {
        self.class_scope.push(class);
    }

    pub fn pop_class_scope(&mut self) {
        self.class_scope.pop();
    }

    /// Enter the magic guard for (object, property). Returns false when
    /// already inside, which tells the caller to skip the hook.
    pub fn enter_magic(&mut self, object_id: usize, property: Symbol) -> bool {
        self.magic_guard.insert((object_id, property))
    }

    pub fn exit_magic(&mut self, object_id: usize, property: Symbol) {
        self.magic_guard.remove(&(object_id, property));
    }

    // -- statics --------------------------------------------------------

    /// The cell backing `Class::$name`. First touch seeds it from the
    /// declaring class's default, null when undeclared.
    pub fn static_var(&mut self, class: ClassId, name: Symbol) -> Var {
        if let Some(existing) = self.statics.get(&(class, name)) {
            return existing.clone();
        }
        let def = self.classes.get(class);
        let initial = def
            .find_static(name)
            .map(|decl| decl.default.clone())
            .unwrap_or(crate::core::value::Value::Null);
        let var = Var::new(initial);
        self.statics.insert((class, name), var.clone());
        var
    }

    pub fn has_static(&self, class: ClassId, name: Symbol) -> bool {
        self.statics.contains_key(&(class, name))
    }
}
