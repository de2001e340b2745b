//! Class definitions and the class table.
//!
//! ## PHP Semantics
//!
//! Class and method names are case-insensitive (ASCII folding); property
//! names are case-sensitive. A definition composes its parent's method
//! and property tables at build time, so dispatch is a single folded-name
//! lookup with no hierarchy walk. Magic methods are resolved once during
//! composition.
//!
//! A built `ClassDef` is immutable and shared. Redefining a name (hosts
//! reloading code) reuses the slot but bumps its generation; a `ClassRef`
//! captured before the redefinition resolves to a stale-reference error
//! instead of silently picking up the new definition.
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_inheritance.c - zend_do_inheritance

use crate::core::interner::{Interner, Symbol};
use crate::core::value::Value;
use crate::runtime::env::{Env, RuntimeError};
use crate::runtime::object::ObjectValue;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Stable index of a class slot in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

/// A class handle that remembers which definition it was taken against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassRef {
    pub id: ClassId,
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// Native method implementation. `this` is `None` for static calls.
pub type MethodHandler =
    fn(&mut Env, Option<&ObjectValue>, &[Value]) -> Result<Value, RuntimeError>;

#[derive(Clone)]
pub struct MethodEntry {
    /// Declared (unfolded) name, for messages.
    pub name: String,
    pub visibility: Visibility,
    pub declared_in: ClassId,
    pub is_static: bool,
    pub handler: MethodHandler,
}

impl std::fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("declared_in", &self.declared_in)
            .field("is_static", &self.is_static)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub name: Symbol,
    pub visibility: Visibility,
    pub declared_in: ClassId,
    pub default: Value,
}

/// Magic hooks, resolved once when the definition is composed.
#[derive(Debug, Clone, Default)]
pub struct MagicMethods {
    pub get: Option<MethodEntry>,
    pub set: Option<MethodEntry>,
    pub call: Option<MethodEntry>,
    pub to_string: Option<MethodEntry>,
    pub construct: Option<MethodEntry>,
    pub destruct: Option<MethodEntry>,
    pub clone: Option<MethodEntry>,
    pub wakeup: Option<MethodEntry>,
    pub sleep: Option<MethodEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassKind {
    #[default]
    Concrete,
    Abstract,
    Interface,
}

/// Input to `ClassTable::define`: one class declaration before
/// composition.
pub struct ClassDecl {
    name: String,
    parent: Option<String>,
    kind: ClassKind,
    is_final: bool,
    methods: Vec<(String, Visibility, bool, MethodHandler)>,
    properties: Vec<(String, Visibility, Value)>,
    static_properties: Vec<(String, Visibility, Value)>,
    constants: Vec<(String, Value)>,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>) -> Self {
        ClassDecl {
            name: name.into(),
            parent: None,
            kind: ClassKind::Concrete,
            is_final: false,
            methods: Vec::new(),
            properties: Vec::new(),
            static_properties: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parent = Some(name.into());
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.kind = ClassKind::Abstract;
        self
    }

    pub fn interface(mut self) -> Self {
        self.kind = ClassKind::Interface;
        self
    }

    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn static_property(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        default: Value,
    ) -> Self {
        self.static_properties.push((name.into(), visibility, default));
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        handler: MethodHandler,
    ) -> Self {
        self.methods.push((name.into(), visibility, false, handler));
        self
    }

    pub fn static_method(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        handler: MethodHandler,
    ) -> Self {
        self.methods.push((name.into(), visibility, true, handler));
        self
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        default: Value,
    ) -> Self {
        self.properties.push((name.into(), visibility, default));
        self
    }

    pub fn constant(mut self, name: impl Into<String>, value: Value) -> Self {
        self.constants.push((name.into(), value));
        self
    }
}

/// A composed, immutable class definition.
#[derive(Debug)]
pub struct ClassDef {
    pub id: ClassId,
    pub name: String,
    pub parent: Option<ClassId>,
    pub kind: ClassKind,
    pub is_final: bool,
    /// Folded method name to entry; parents composed in, overrides win.
    methods: HashMap<String, MethodEntry>,
    /// Parent-first declaration order; drives default property layout.
    properties: IndexMap<Symbol, PropertyDecl>,
    /// Static property declarations; values live per-execution in `Env`.
    static_properties: IndexMap<Symbol, PropertyDecl>,
    constants: HashMap<String, Value>,
    /// Self plus every ancestor, for instanceof.
    ancestors: HashSet<ClassId>,
    pub magic: MagicMethods,
}

/// ASCII case folding for class and method names.
pub fn fold_case(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl ClassDef {
    pub fn find_method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.get(&fold_case(name))
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.properties.values()
    }

    pub fn find_property(&self, name: Symbol) -> Option<&PropertyDecl> {
        self.properties.get(&name)
    }

    pub fn find_static(&self, name: Symbol) -> Option<&PropertyDecl> {
        self.static_properties.get(&name)
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn is_a(&self, other: ClassId) -> bool {
        self.ancestors.contains(&other)
    }
}

/// Whether code running in `scope` may touch a member declared in
/// `declared_in` with `visibility`.
pub fn is_visible(
    table: &ClassTable,
    visibility: Visibility,
    declared_in: ClassId,
    scope: Option<ClassId>,
) -> bool {
    match visibility {
        Visibility::Public => true,
        Visibility::Private => scope == Some(declared_in),
        Visibility::Protected => match scope {
            Some(scope) => {
                let scope_def = table.get(scope);
                scope_def.is_a(declared_in) || table.get(declared_in).is_a(scope)
            }
            None => false,
        },
    }
}

struct ClassSlot {
    def: Arc<ClassDef>,
    generation: u32,
}

/// The global class registry. Slots are append-only; redefinition swaps
/// the slot's definition and bumps its generation.
pub struct ClassTable {
    by_name: HashMap<String, ClassId>,
    slots: Vec<ClassSlot>,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassTable {
    pub fn new() -> Self {
        ClassTable {
            by_name: HashMap::new(),
            slots: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Compose and install a declaration. An existing name is redefined
    /// in place; every previously issued `ClassRef` to it goes stale.
    pub fn define(
        &mut self,
        decl: ClassDecl,
        interner: &mut Interner,
    ) -> Result<ClassRef, RuntimeError> {
        let parent_id = match &decl.parent {
            Some(name) => {
                let id = self
                    .lookup(name)
                    .map(|r| r.id)
                    .ok_or_else(|| RuntimeError::UndefinedClass { name: name.clone() })?;
                let parent = self.get(id);
                if parent.is_final {
                    return Err(RuntimeError::FinalInheritance {
                        class: decl.name.clone(),
                        parent: parent.name.clone(),
                    });
                }
                Some(id)
            }
            None => None,
        };

        let folded = fold_case(&decl.name);
        let id = match self.by_name.get(&folded) {
            Some(&id) => id,
            None => {
                let id = ClassId(self.slots.len() as u32);
                self.by_name.insert(folded, id);
                // Placeholder until composition finishes.
                self.slots.push(ClassSlot {
                    def: Arc::new(ClassDef {
                        id,
                        name: decl.name.clone(),
                        parent: None,
                        kind: ClassKind::Concrete,
                        is_final: false,
                        methods: HashMap::new(),
                        properties: IndexMap::new(),
                        static_properties: IndexMap::new(),
                        constants: HashMap::new(),
                        ancestors: HashSet::new(),
                        magic: MagicMethods::default(),
                    }),
                    generation: 0,
                });
                id
            }
        };

        let mut methods = HashMap::new();
        let mut properties = IndexMap::new();
        let mut static_properties = IndexMap::new();
        let mut constants = HashMap::new();
        let mut ancestors = HashSet::new();
        ancestors.insert(id);

        if let Some(parent_id) = parent_id {
            let parent = self.get(parent_id);
            methods.extend(parent.methods.iter().map(|(k, v)| (k.clone(), v.clone())));
            properties.extend(parent.properties.iter().map(|(k, v)| (*k, v.clone())));
            static_properties.extend(
                parent
                    .static_properties
                    .iter()
                    .map(|(k, v)| (*k, v.clone())),
            );
            constants.extend(parent.constants.iter().map(|(k, v)| (k.clone(), v.clone())));
            ancestors.extend(parent.ancestors.iter().copied());
        }

        for (name, visibility, is_static, handler) in decl.methods {
            let entry = MethodEntry {
                name: name.clone(),
                visibility,
                declared_in: id,
                is_static,
                handler,
            };
            methods.insert(fold_case(&name), entry);
        }

        for (name, visibility, default) in decl.properties {
            let symbol = interner.intern(name.as_bytes());
            properties.insert(
                symbol,
                PropertyDecl {
                    name: symbol,
                    visibility,
                    declared_in: id,
                    default,
                },
            );
        }

        for (name, visibility, default) in decl.static_properties {
            let symbol = interner.intern(name.as_bytes());
            static_properties.insert(
                symbol,
                PropertyDecl {
                    name: symbol,
                    visibility,
                    declared_in: id,
                    default,
                },
            );
        }

        for (name, value) in decl.constants {
            constants.insert(name, value);
        }

        let magic = MagicMethods {
            get: methods.get("__get").cloned(),
            set: methods.get("__set").cloned(),
            call: methods.get("__call").cloned(),
            to_string: methods.get("__tostring").cloned(),
            construct: methods.get("__construct").cloned(),
            destruct: methods.get("__destruct").cloned(),
            clone: methods.get("__clone").cloned(),
            wakeup: methods.get("__wakeup").cloned(),
            sleep: methods.get("__sleep").cloned(),
        };

        let def = Arc::new(ClassDef {
            id,
            name: decl.name,
            parent: parent_id,
            kind: decl.kind,
            is_final: decl.is_final,
            methods,
            properties,
            static_properties,
            constants,
            ancestors,
            magic,
        });

        let slot = &mut self.slots[id.0 as usize];
        // The placeholder has no ancestors; a composed definition always
        // contains itself.
        let generation = if slot.def.ancestors.is_empty() {
            slot.generation
        } else {
            slot.generation + 1
        };
        slot.def = def;
        slot.generation = generation;

        Ok(ClassRef { id, generation })
    }

    pub fn lookup(&self, name: &str) -> Option<ClassRef> {
        let id = *self.by_name.get(&fold_case(name))?;
        Some(ClassRef {
            id,
            generation: self.slots[id.0 as usize].generation,
        })
    }

    /// Current definition of a slot, generation ignored.
    pub fn get(&self, id: ClassId) -> Arc<ClassDef> {
        self.slots[id.0 as usize].def.clone()
    }

    /// Definition behind a handle, failing if the slot was redefined
    /// after the handle was issued.
    pub fn resolve(&self, class_ref: ClassRef) -> Result<Arc<ClassDef>, RuntimeError> {
        let slot = &self.slots[class_ref.id.0 as usize];
        if slot.generation != class_ref.generation {
            return Err(RuntimeError::StaleClassRef {
                name: slot.def.name.clone(),
            });
        }
        Ok(slot.def.clone())
    }
}
