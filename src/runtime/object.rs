//! Object instances and member dispatch.
//!
//! ## PHP Semantics
//!
//! Objects are handles: assignment and argument passing share the same
//! instance, only `clone` copies. Property storage is ordered (declaration
//! order, then dynamic properties in creation order) and each entry
//! remembers its visibility and declaring class, which is what private
//! name mangling in the serializer keys off.
//!
//! Method dispatch folds the name, checks visibility against the calling
//! scope, and falls back to `__call` with the packed argument list.
//! Property reads and writes fall back to `__get`/`__set` for missing or
//! inaccessible names, with a per-object per-property guard so a hook
//! touching its own subject recurses into plain storage instead of
//! looping.
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_object_handlers.c

use crate::core::interner::Symbol;
use crate::core::value::Value;
use crate::core::var::Var;
use crate::core::array::{ArrayValue, Slot};
use crate::core::compare::{loose_eq, strict_eq};
use crate::core::string::StringValue;
use crate::runtime::class::{is_visible, ClassId, ClassKind, MethodEntry, Visibility};
use crate::runtime::env::{Env, RuntimeError};
use indexmap::IndexMap;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct PropEntry {
    pub slot: Slot,
    pub visibility: Visibility,
    pub declared_in: ClassId,
}

#[derive(Debug)]
pub struct ObjectData {
    pub class: ClassId,
    pub props: IndexMap<Symbol, PropEntry>,
}

/// An object handle. Cloning the handle shares the instance.
#[derive(Debug, Clone)]
pub struct ObjectValue {
    data: Rc<RefCell<ObjectData>>,
}

impl ObjectValue {
    fn from_data(data: ObjectData) -> Self {
        ObjectValue {
            data: Rc::new(RefCell::new(data)),
        }
    }

    pub fn class_id(&self) -> ClassId {
        self.data.borrow().class
    }

    pub fn class_name(&self, env: &Env) -> String {
        env.classes.get(self.class_id()).name.clone()
    }

    /// Instance identity, for `===` and serializer visited maps.
    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.data) as *const () as usize
    }

    pub fn ptr_eq(a: &ObjectValue, b: &ObjectValue) -> bool {
        Rc::ptr_eq(&a.data, &b.data)
    }

    pub fn prop_count(&self) -> usize {
        self.data.borrow().props.len()
    }

    /// Read access to the raw property table. Callers must not re-enter
    /// the object while holding the guard.
    pub fn borrow_data(&self) -> Ref<'_, ObjectData> {
        self.data.borrow()
    }

    /// Raw property insertion, bypassing hooks and visibility. This is
    /// the unserializer's path.
    pub fn insert_raw(
        &self,
        name: Symbol,
        visibility: Visibility,
        declared_in: ClassId,
        slot: Slot,
    ) {
        self.data.borrow_mut().props.insert(
            name,
            PropEntry {
                slot,
                visibility,
                declared_in,
            },
        );
    }

    /// Pairwise property comparison for `==` (loose) and the object
    /// ordering table.
    pub fn props_eq(a: &ObjectValue, b: &ObjectValue, strict: bool) -> bool {
        let da = a.data.borrow();
        let db = b.data.borrow();
        if da.props.len() != db.props.len() {
            return false;
        }
        da.props.iter().all(|(name, entry)| match db.props.get(name) {
            Some(other) => {
                if strict {
                    strict_eq(&entry.slot.get(), &other.slot.get())
                } else {
                    loose_eq(&entry.slot.get(), &other.slot.get())
                }
            }
            None => false,
        })
    }
}

fn run_method(
    env: &mut Env,
    entry: &MethodEntry,
    this: Option<&ObjectValue>,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    env.push_class_scope(entry.declared_in);
    let result = (entry.handler)(env, this, args);
    env.pop_class_scope();
    result
}

/// Instantiate without running a constructor: declared properties get
/// their defaults. This is also the unserializer's entry point.
pub fn create_object(env: &mut Env, class_name: &str) -> Result<ObjectValue, RuntimeError> {
    let class_ref = env
        .classes
        .lookup(class_name)
        .ok_or_else(|| RuntimeError::UndefinedClass {
            name: class_name.to_string(),
        })?;
    let def = env.classes.get(class_ref.id);
    if def.kind != ClassKind::Concrete {
        return Err(RuntimeError::AbstractInstantiation {
            name: def.name.clone(),
        });
    }

    let mut props = IndexMap::new();
    for decl in def.properties() {
        props.insert(
            decl.name,
            PropEntry {
                slot: Slot::Value(decl.default.clone()),
                visibility: decl.visibility,
                declared_in: decl.declared_in,
            },
        );
    }

    Ok(ObjectValue::from_data(ObjectData {
        class: def.id,
        props,
    }))
}

/// `new Name(args)`: instantiate, then run `__construct` if declared.
pub fn call_new(env: &mut Env, class_name: &str, args: &[Value]) -> Result<ObjectValue, RuntimeError> {
    let object = create_object(env, class_name)?;
    let construct = env.classes.get(object.class_id()).magic.construct.clone();
    if let Some(entry) = construct {
        run_method(env, &entry, Some(&object), args)?;
    }
    Ok(object)
}

/// Dispatch `$obj->name(args)`. Missing or inaccessible methods fall back
/// to `__call($name, $args)`.
pub fn call_method(
    env: &mut Env,
    object: &ObjectValue,
    name: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let def = env.classes.get(object.class_id());
    let found = def.find_method(name).cloned();

    if let Some(entry) = &found {
        if is_visible(&env.classes, entry.visibility, entry.declared_in, env.current_scope()) {
            return run_method(env, entry, Some(object), args);
        }
    }

    if let Some(call) = def.magic.call.clone() {
        let packed = [
            Value::string(name.as_bytes().to_vec()),
            Value::Array(ArrayValue::from_values(args.iter().map(Value::to_arg_value))),
        ];
        return run_method(env, &call, Some(object), &packed);
    }

    match found {
        Some(_) => Err(RuntimeError::MethodAccess {
            class: def.name.clone(),
            method: name.to_string(),
        }),
        None => Err(RuntimeError::UndefinedMethod {
            class: def.name.clone(),
            method: name.to_string(),
        }),
    }
}

/// Dispatch `Name::method(args)` with no instance.
pub fn call_static(
    env: &mut Env,
    class_name: &str,
    name: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let class_ref = env
        .classes
        .lookup(class_name)
        .ok_or_else(|| RuntimeError::UndefinedClass {
            name: class_name.to_string(),
        })?;
    let def = env.classes.get(class_ref.id);
    let entry = def
        .find_method(name)
        .cloned()
        .ok_or_else(|| RuntimeError::UndefinedMethod {
            class: def.name.clone(),
            method: name.to_string(),
        })?;
    if !is_visible(&env.classes, entry.visibility, entry.declared_in, env.current_scope()) {
        return Err(RuntimeError::MethodAccess {
            class: def.name.clone(),
            method: name.to_string(),
        });
    }
    run_method(env, &entry, None, args)
}

/// Read `$obj->name`. Missing and inaccessible properties go through
/// `__get` when present; otherwise a missing property is a notice and
/// reads as unset.
pub fn get_field(env: &mut Env, object: &ObjectValue, name: &str) -> Result<Value, RuntimeError> {
    let symbol = env.intern(name);
    let scope = env.current_scope();

    let direct = {
        let data = object.data.borrow();
        match data.props.get(&symbol) {
            Some(entry) if is_visible(&env.classes, entry.visibility, entry.declared_in, scope) => {
                Some(entry.slot.get())
            }
            Some(_) => None,
            None => None,
        }
    };
    if let Some(value) = direct {
        return Ok(value);
    }

    let def = env.classes.get(object.class_id());
    if let Some(get) = def.magic.get.clone() {
        if env.enter_magic(object.ptr_id(), symbol) {
            let result = run_method(env, &get, Some(object), &[Value::string(name.as_bytes().to_vec())]);
            env.exit_magic(object.ptr_id(), symbol);
            return result;
        }
    }

    let inaccessible = object.data.borrow().props.contains_key(&symbol);
    if inaccessible {
        return Err(RuntimeError::PropertyAccess {
            class: def.name.clone(),
            property: name.to_string(),
        });
    }
    env.notice(format!("Undefined property: {}::${}", def.name, name));
    Ok(Value::Unset)
}

/// Write `$obj->name = value`. Missing and inaccessible properties go
/// through `__set` when present; a plain missing property becomes a
/// public dynamic property.
pub fn put_field(
    env: &mut Env,
    object: &ObjectValue,
    name: &str,
    value: Value,
) -> Result<(), RuntimeError> {
    let symbol = env.intern(name);
    let scope = env.current_scope();

    enum Direct {
        Wrote,
        Inaccessible,
        Missing,
    }

    let direct = {
        let mut data = object.data.borrow_mut();
        match data.props.get_mut(&symbol) {
            Some(entry) => {
                if is_visible(&env.classes, entry.visibility, entry.declared_in, scope) {
                    match value.clone() {
                        Value::Ref(var) => {
                            var.set_referenced();
                            entry.slot = Slot::Ref(var);
                        }
                        plain => entry.slot.set(plain),
                    }
                    Direct::Wrote
                } else {
                    Direct::Inaccessible
                }
            }
            None => Direct::Missing,
        }
    };
    if matches!(direct, Direct::Wrote) {
        return Ok(());
    }

    let def = env.classes.get(object.class_id());
    if let Some(set) = def.magic.set.clone() {
        if env.enter_magic(object.ptr_id(), symbol) {
            let args = [Value::string(name.as_bytes().to_vec()), value.to_arg_value()];
            let result = run_method(env, &set, Some(object), &args);
            env.exit_magic(object.ptr_id(), symbol);
            return result.map(|_| ());
        }
    }

    match direct {
        Direct::Inaccessible => Err(RuntimeError::PropertyAccess {
            class: def.name.clone(),
            property: name.to_string(),
        }),
        _ => {
            let class = object.class_id();
            let slot = match value {
                Value::Ref(var) => {
                    var.set_referenced();
                    Slot::Ref(var)
                }
                plain => Slot::Value(plain.to_value()),
            };
            object.insert_raw(symbol, Visibility::Public, class, slot);
            Ok(())
        }
    }
}

/// `&$obj->name`: promote the property slot to a shared cell, creating a
/// null public property when missing. Magic hooks are not consulted.
pub fn get_field_ref(
    env: &mut Env,
    object: &ObjectValue,
    name: &str,
) -> Result<Var, RuntimeError> {
    let symbol = env.intern(name);
    let scope = env.current_scope();

    let mut data = object.data.borrow_mut();
    if let Some(entry) = data.props.get(&symbol) {
        if !is_visible(&env.classes, entry.visibility, entry.declared_in, scope) {
            let class = env.classes.get(object.class_id()).name.clone();
            return Err(RuntimeError::PropertyAccess {
                class,
                property: name.to_string(),
            });
        }
    } else {
        let class = data.class;
        data.props.insert(
            symbol,
            PropEntry {
                slot: Slot::Value(Value::Null),
                visibility: Visibility::Public,
                declared_in: class,
            },
        );
    }

    let entry = data.props.get_mut(&symbol).unwrap();
    Ok(match &mut entry.slot {
        Slot::Ref(var) => var.clone(),
        Slot::Value(v) => {
            let var = Var::new(std::mem::replace(v, Value::Null));
            entry.slot = Slot::Ref(var.clone());
            var
        }
    })
}

/// `unset($obj->name)`.
pub fn remove_field(env: &mut Env, object: &ObjectValue, name: &str) -> Result<(), RuntimeError> {
    let symbol = env.intern(name);
    let scope = env.current_scope();
    let mut data = object.data.borrow_mut();
    if let Some(entry) = data.props.get(&symbol) {
        if !is_visible(&env.classes, entry.visibility, entry.declared_in, scope) {
            let class = env.classes.get(data.class).name.clone();
            return Err(RuntimeError::PropertyAccess {
                class,
                property: name.to_string(),
            });
        }
        data.props.shift_remove(&symbol);
    }
    Ok(())
}

/// `clone $obj`: shallow copy. Referenced property cells stay shared,
/// plain values are copied, then `__clone` runs on the copy.
pub fn clone_object(env: &mut Env, object: &ObjectValue) -> Result<ObjectValue, RuntimeError> {
    let copy = {
        let data = object.data.borrow();
        ObjectValue::from_data(ObjectData {
            class: data.class,
            props: data
                .props
                .iter()
                .map(|(name, entry)| (*name, entry.clone()))
                .collect(),
        })
    };
    let hook = env.classes.get(copy.class_id()).magic.clone.clone();
    if let Some(entry) = hook {
        run_method(env, &entry, Some(&copy), &[])?;
    }
    Ok(copy)
}

/// String conversion through `__toString`; an object without the hook
/// cannot become a string.
pub fn to_string_object(env: &mut Env, object: &ObjectValue) -> Result<StringValue, RuntimeError> {
    let def = env.classes.get(object.class_id());
    match def.magic.to_string.clone() {
        Some(entry) => {
            let result = run_method(env, &entry, Some(object), &[])?;
            Ok(result.to_string_value())
        }
        None => Err(RuntimeError::NoStringConversion {
            class: def.name.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::array::ArrayKey;
    use crate::runtime::class::ClassDecl;

    fn define(env: &mut Env, decl: ClassDecl) {
        env.classes.define(decl, &mut env.interner).unwrap();
    }

    #[test]
    fn defaults_then_handle_semantics() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Point")
                .property("x", Visibility::Public, Value::Int(0))
                .property("y", Visibility::Public, Value::Int(0)),
        );
        let p = create_object(&mut env, "Point").unwrap();
        assert_eq!(get_field(&mut env, &p, "x").unwrap(), Value::Int(0));

        // Assignment of the handle shares the instance.
        let q = p.clone();
        put_field(&mut env, &q, "x", Value::Int(5)).unwrap();
        assert_eq!(get_field(&mut env, &p, "x").unwrap(), Value::Int(5));
        assert!(ObjectValue::ptr_eq(&p, &q));
    }

    #[test]
    fn clone_copies_and_runs_hook() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Counter")
                .property("n", Visibility::Public, Value::Int(1))
                .method("__clone", Visibility::Public, |env, this, _| {
                    put_field(env, this.unwrap(), "cloned", Value::Bool(true))?;
                    Ok(Value::Null)
                }),
        );
        let a = create_object(&mut env, "Counter").unwrap();
        let b = clone_object(&mut env, &a).unwrap();
        assert!(!ObjectValue::ptr_eq(&a, &b));

        put_field(&mut env, &b, "n", Value::Int(9)).unwrap();
        assert_eq!(get_field(&mut env, &a, "n").unwrap(), Value::Int(1));
        assert_eq!(get_field(&mut env, &b, "cloned").unwrap(), Value::Bool(true));
        assert_eq!(get_field(&mut env, &a, "cloned").unwrap(), Value::Unset);
    }

    #[test]
    fn constructor_receives_args() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Pair")
                .property("a", Visibility::Public, Value::Null)
                .method("__construct", Visibility::Public, |env, this, args| {
                    put_field(env, this.unwrap(), "a", args[0].to_arg_value())?;
                    Ok(Value::Null)
                }),
        );
        let p = call_new(&mut env, "Pair", &[Value::Int(42)]).unwrap();
        assert_eq!(get_field(&mut env, &p, "a").unwrap(), Value::Int(42));
    }

    #[test]
    fn private_property_blocked_outside_visible_inside() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Vault")
                .property("secret", Visibility::Private, Value::Int(7))
                .method("peek", Visibility::Public, |env, this, _| {
                    get_field(env, this.unwrap(), "secret")
                }),
        );
        let v = create_object(&mut env, "Vault").unwrap();
        assert!(matches!(
            get_field(&mut env, &v, "secret"),
            Err(RuntimeError::PropertyAccess { .. })
        ));
        assert_eq!(call_method(&mut env, &v, "peek", &[]).unwrap(), Value::Int(7));
    }

    #[test]
    fn protected_visible_to_subclass() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Base").property("p", Visibility::Protected, Value::Int(3)),
        );
        define(
            &mut env,
            ClassDecl::new("Sub")
                .parent("Base")
                .method("read", Visibility::Public, |env, this, _| {
                    get_field(env, this.unwrap(), "p")
                }),
        );
        let s = create_object(&mut env, "Sub").unwrap();
        assert_eq!(call_method(&mut env, &s, "read", &[]).unwrap(), Value::Int(3));
        assert!(get_field(&mut env, &s, "p").is_err());
    }

    #[test]
    fn missing_method_falls_back_to_call() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Proxy").method("__call", Visibility::Public, |_, _, args| {
                // Hand back "name:argcount".
                let name = args[0].to_string_value();
                let count = match &args[1] {
                    Value::Array(a) => a.len(),
                    _ => 0,
                };
                Ok(Value::string(format!(
                    "{}:{}",
                    String::from_utf8_lossy(name.as_bytes()),
                    count
                )))
            }),
        );
        let p = create_object(&mut env, "Proxy").unwrap();
        let r = call_method(&mut env, &p, "missing", &[Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(r, Value::string("missing:2"));
    }

    #[test]
    fn magic_get_set_with_guard() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Bag")
                // Private backing slot; the hooks run in Bag scope and see it.
                .property("_color", Visibility::Private, Value::Null)
                .method("__get", Visibility::Public, |env, this, args| {
                    let name = args[0].to_string_value();
                    let backing = format!("_{}", String::from_utf8_lossy(name.as_bytes()));
                    get_field(env, this.unwrap(), &backing)
                })
                .method("__set", Visibility::Public, |env, this, args| {
                    let name = args[0].to_string_value();
                    let backing = format!("_{}", String::from_utf8_lossy(name.as_bytes()));
                    put_field(env, this.unwrap(), &backing, args[1].to_arg_value())?;
                    Ok(Value::Null)
                }),
        );
        let b = create_object(&mut env, "Bag").unwrap();
        put_field(&mut env, &b, "color", Value::string("red")).unwrap();
        assert_eq!(get_field(&mut env, &b, "color").unwrap(), Value::string("red"));
    }

    #[test]
    fn magic_get_self_reference_does_not_loop() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Loop").method("__get", Visibility::Public, |env, this, args| {
                // Asks for the same missing property again.
                let name = args[0].to_string_value();
                get_field(
                    env,
                    this.unwrap(),
                    &String::from_utf8_lossy(name.as_bytes()),
                )
            }),
        );
        let l = create_object(&mut env, "Loop").unwrap();
        assert_eq!(get_field(&mut env, &l, "ghost").unwrap(), Value::Unset);
        assert!(!env.diagnostics().is_empty());
    }

    #[test]
    fn field_ref_aliases_storage() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Holder").property("v", Visibility::Public, Value::Int(1)),
        );
        let h = create_object(&mut env, "Holder").unwrap();
        let r = get_field_ref(&mut env, &h, "v").unwrap().to_ref_var();
        r.set(Value::Int(10));
        assert_eq!(get_field(&mut env, &h, "v").unwrap(), Value::Int(10));

        // The alias survives a clone as shared storage.
        let c = clone_object(&mut env, &h).unwrap();
        r.set(Value::Int(20));
        assert_eq!(get_field(&mut env, &c, "v").unwrap(), Value::Int(20));
    }

    #[test]
    fn static_method_and_static_storage() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Registry").static_method("bump", Visibility::Public, |env, this, _| {
                assert!(this.is_none());
                let class = env.classes.lookup("Registry").unwrap().id;
                let name = env.intern("count");
                let cell = env.static_var(class, name);
                let next = cell.get().to_long() + 1;
                cell.set(Value::Int(next));
                Ok(Value::Int(next))
            }),
        );
        assert_eq!(call_static(&mut env, "Registry", "bump", &[]).unwrap(), Value::Int(1));
        assert_eq!(call_static(&mut env, "Registry", "bump", &[]).unwrap(), Value::Int(2));
    }

    #[test]
    fn tostring_hook() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Money").method("__toString", Visibility::Public, |_, _, _| {
                Ok(Value::string("$5"))
            }),
        );
        define(&mut env, ClassDecl::new("Mute"));
        let m = create_object(&mut env, "Money").unwrap();
        assert_eq!(to_string_object(&mut env, &m).unwrap().as_bytes(), b"$5");
        let mute = create_object(&mut env, "Mute").unwrap();
        assert!(matches!(
            to_string_object(&mut env, &mute),
            Err(RuntimeError::NoStringConversion { .. })
        ));
    }

    #[test]
    fn abstract_and_interface_refuse_instantiation() {
        let mut env = Env::new();
        define(&mut env, ClassDecl::new("Shape").abstract_class());
        define(&mut env, ClassDecl::new("Drawable").interface());
        define(&mut env, ClassDecl::new("Circle").parent("Shape"));
        assert!(matches!(
            create_object(&mut env, "Shape"),
            Err(RuntimeError::AbstractInstantiation { .. })
        ));
        assert!(matches!(
            create_object(&mut env, "Drawable"),
            Err(RuntimeError::AbstractInstantiation { .. })
        ));
        assert!(create_object(&mut env, "Circle").is_ok());
    }

    #[test]
    fn unset_removes_property() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Doc").property("title", Visibility::Public, Value::string("x")),
        );
        let d = create_object(&mut env, "Doc").unwrap();
        remove_field(&mut env, &d, "title").unwrap();
        assert_eq!(get_field(&mut env, &d, "title").unwrap(), Value::Unset);
        assert_eq!(d.prop_count(), 0);
    }

    #[test]
    fn loose_equality_compares_props() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("P").property("x", Visibility::Public, Value::Int(0)),
        );
        let a = create_object(&mut env, "P").unwrap();
        let b = create_object(&mut env, "P").unwrap();
        assert!(loose_eq(&Value::Object(a.clone()), &Value::Object(b.clone())));
        assert!(!strict_eq(&Value::Object(a.clone()), &Value::Object(b.clone())));
        put_field(&mut env, &b, "x", Value::Int(1)).unwrap();
        assert!(!loose_eq(&Value::Object(a), &Value::Object(b)));
    }

    #[test]
    fn objects_in_arrays_share_state() {
        let mut env = Env::new();
        define(
            &mut env,
            ClassDecl::new("Node").property("tag", Visibility::Public, Value::Null),
        );
        let n = create_object(&mut env, "Node").unwrap();
        let mut arr = ArrayValue::new();
        arr.put(ArrayKey::Int(0), Value::Object(n.clone()));
        let copy = arr.clone();

        put_field(&mut env, &n, "tag", Value::Int(1)).unwrap();
        // COW copies the handle, not the object.
        match copy.get(&ArrayKey::Int(0)) {
            Value::Object(o) => {
                assert_eq!(get_field(&mut env, &o, "tag").unwrap(), Value::Int(1));
            }
            other => panic!("expected object, got {:?}", other),
        }
    }
}
