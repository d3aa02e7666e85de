//! Global object store and message dispatch
//!
//! One process-wide store owns every class and object. Lookups run under a
//! brief read lock; method bodies always run with no store lock held, so an
//! implementation is free to call back into the store (including destroying
//! the receiver).
//!
//! Lock discipline: code holding the store lock never formats an
//! [`ObjectRef`] with `Display` (that re-enters the store) and never calls a
//! [`Method`]. Selector formatting only touches the intern table, which is
//! independent of the store lock.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use parking_lot::RwLock;
use slotmap::SlotMap;
use tracing::{debug, info, trace, warn};

use crate::class::{ClassId, Method};
use crate::error::CallError;
use crate::object::{ObjectId, ObjectRef};
use crate::selector::{selector, Selector};
use crate::value::Value;

/// Selectors of the root class protocol.
///
/// Every object responds to these; `retain`/`release` drive the reference
/// count and `dealloc` is dispatched once as part of destruction.
pub mod builtin {
    use crate::selector::{selector, Selector};

    /// `retain/0`: increments the receiver's reference count.
    pub fn retain() -> Selector {
        selector("retain", 0)
    }

    /// `release/0`: decrements the count, destroying the receiver at zero.
    pub fn release() -> Selector {
        selector("release", 0)
    }

    /// `dealloc/0`: dispatched while the receiver is being destroyed.
    pub fn dealloc() -> Selector {
        selector("dealloc", 0)
    }

    /// `description/0`: human readable summary of the receiver.
    pub fn description() -> Selector {
        selector("description", 0)
    }
}

type DestroyObserver = Arc<dyn Fn(ObjectRef) + Send + Sync>;

struct ClassDef {
    name: String,
    superclass: Option<ClassId>,
    methods: HashMap<Selector, Method>,
}

struct ObjectCell {
    class: ClassId,
    refcount: u32,
    /// Set for the window between the start of destruction and slot
    /// reclamation. Gates re-entrant destroys.
    dying: bool,
    fields: HashMap<String, Value>,
    /// Per-object dispatch entries, consulted before the class chain.
    overrides: HashMap<Selector, Method>,
}

struct Store {
    classes: SlotMap<ClassId, ClassDef>,
    objects: SlotMap<ObjectId, ObjectCell>,
    root: ClassId,
    destroy_observer: Option<DestroyObserver>,
}

static STORE: LazyLock<RwLock<Store>> = LazyLock::new(|| RwLock::new(Store::bootstrap()));

/// Name index for class handles. Re-registering a name repoints the index
/// at the newest class.
static CLASS_INDEX: LazyLock<DashMap<String, ClassId>> = LazyLock::new(DashMap::new);

impl Store {
    fn bootstrap() -> Store {
        let mut methods = HashMap::new();
        methods.insert(builtin::retain(), Method::new(0, retain_imp));
        methods.insert(builtin::release(), Method::new(0, release_imp));
        methods.insert(builtin::dealloc(), Method::new(0, |_, _| Ok(Value::Nil)));
        methods.insert(builtin::description(), Method::new(0, description_imp));

        let mut classes = SlotMap::with_key();
        let root = classes.insert(ClassDef {
            name: "Object".to_string(),
            superclass: None,
            methods,
        });
        CLASS_INDEX.insert("Object".to_string(), root);
        debug!("object store bootstrapped, root class registered");

        Store {
            classes,
            objects: SlotMap::with_key(),
            root,
            destroy_observer: None,
        }
    }

    /// Walks the superclass chain looking for the selector. Instance
    /// overrides are the caller's concern.
    fn resolve_in_chain(&self, class: ClassId, sel: Selector) -> Option<(ClassId, Method)> {
        let mut cursor = Some(class);
        while let Some(id) = cursor {
            let def = self.classes.get(id)?;
            if let Some(method) = def.methods.get(&sel) {
                return Some((id, method.clone()));
            }
            cursor = def.superclass;
        }
        None
    }

    fn class_label(&self, class: ClassId) -> String {
        match self.classes.get(class) {
            Some(def) => def.name.clone(),
            None => "<unknown class>".to_string(),
        }
    }
}

fn retain_imp(receiver: ObjectRef, _args: &[Value]) -> Result<Value, CallError> {
    let mut store = STORE.write();
    let cell = store
        .objects
        .get_mut(receiver.id())
        .ok_or(CallError::DeadObject)?;
    cell.refcount += 1;
    trace!("retain {:?} -> {}", receiver, cell.refcount);
    Ok(Value::Object(receiver))
}

fn release_imp(receiver: ObjectRef, _args: &[Value]) -> Result<Value, CallError> {
    let remaining = {
        let mut store = STORE.write();
        let cell = store
            .objects
            .get_mut(receiver.id())
            .ok_or(CallError::DeadObject)?;
        if cell.refcount == 0 {
            warn!("release on {:?} with zero refcount", receiver);
            0
        } else {
            cell.refcount -= 1;
            cell.refcount
        }
    };
    trace!("release {:?} -> {}", receiver, remaining);
    if remaining == 0 {
        match destroy(receiver) {
            Ok(()) => {}
            // Another thread (or a re-entrant dealloc) already started
            // tearing the object down.
            Err(CallError::DeadObject) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(Value::Int(remaining as i64))
}

fn description_imp(receiver: ObjectRef, _args: &[Value]) -> Result<Value, CallError> {
    let store = STORE.read();
    let cell = store
        .objects
        .get(receiver.id())
        .ok_or(CallError::DeadObject)?;
    let label = store.class_label(cell.class);
    Ok(Value::Str(format!("<{} {:?}>", label, receiver)))
}

/// Registers a class. Called through [`ClassBuilder::register`].
///
/// [`ClassBuilder::register`]: crate::class::ClassBuilder::register
pub(crate) fn register_class(
    name: String,
    superclass: Option<ClassId>,
    methods: Vec<(String, Method)>,
) -> ClassId {
    let mut table = HashMap::with_capacity(methods.len());
    for (method_name, method) in methods {
        let sel = selector(&method_name, method.arity());
        if table.insert(sel, method).is_some() {
            warn!("class {} defines {} twice, keeping the last", name, sel);
        }
    }

    let id = {
        let mut store = STORE.write();
        let parent = match superclass {
            Some(parent) if store.classes.contains_key(parent) => Some(parent),
            Some(_) => {
                warn!("class {} names an unknown superclass, using root", name);
                Some(store.root)
            }
            None => Some(store.root),
        };
        store.classes.insert(ClassDef {
            name: name.clone(),
            superclass: parent,
            methods: table,
        })
    };

    if CLASS_INDEX.insert(name.clone(), id).is_some() {
        debug!("class name {} re-registered", name);
    }
    info!("registered class {} ({:?})", name, id);
    id
}

/// Allocates an instance with a reference count of one.
///
/// Returns `None` for a class handle that was never registered.
pub fn alloc(class: ClassId) -> Option<ObjectRef> {
    let mut store = STORE.write();
    if !store.classes.contains_key(class) {
        warn!("alloc against unregistered class {:?}", class);
        return None;
    }
    let id = store.objects.insert(ObjectCell {
        class,
        refcount: 1,
        dying: false,
        fields: HashMap::new(),
        overrides: HashMap::new(),
    });
    let obj = ObjectRef::new(id);
    trace!("allocated {:?} of {}", obj, store.class_label(class));
    Some(obj)
}

/// Whether the handle still resolves to a live object.
pub fn is_alive(obj: ObjectRef) -> bool {
    STORE.read().objects.contains_key(obj.id())
}

/// Class of a live object.
pub fn class_of(obj: ObjectRef) -> Option<ClassId> {
    STORE.read().objects.get(obj.id()).map(|cell| cell.class)
}

/// Registered name of a class.
pub fn class_name(class: ClassId) -> Option<String> {
    STORE.read().classes.get(class).map(|def| def.name.clone())
}

/// Looks a class up by name. With duplicate names, the newest wins.
pub fn class_by_name(name: &str) -> Option<ClassId> {
    CLASS_INDEX.get(name).map(|entry| *entry)
}

/// The root class every registration chains up to.
pub fn root_class() -> ClassId {
    STORE.read().root
}

/// Direct superclass, `None` for the root.
pub fn superclass_of(class: ClassId) -> Option<ClassId> {
    STORE.read().classes.get(class).and_then(|def| def.superclass)
}

/// True when `ancestor` is `class` itself or appears on its superclass
/// chain.
pub fn is_ancestor(ancestor: ClassId, class: ClassId) -> bool {
    let store = STORE.read();
    let mut cursor = Some(class);
    while let Some(id) = cursor {
        if id == ancestor {
            return true;
        }
        cursor = store.classes.get(id).and_then(|def| def.superclass);
    }
    false
}

/// Whether instances of `class` respond to `sel` (ignores per-object
/// overrides).
pub fn responds_to(class: ClassId, sel: Selector) -> bool {
    STORE.read().resolve_in_chain(class, sel).is_some()
}

/// Resolves a selector against the class chain.
pub fn resolve_method(class: ClassId, sel: Selector) -> Option<Method> {
    STORE
        .read()
        .resolve_in_chain(class, sel)
        .map(|(_, method)| method)
}

/// Resolves a selector and reports which class on the chain owns the entry.
pub fn resolve_owner(class: ClassId, sel: Selector) -> Option<(ClassId, Method)> {
    STORE.read().resolve_in_chain(class, sel)
}

/// Installs `method` in the class's own table, returning the entry it
/// displaced there. `None` also covers an inherited selector the class had
/// no own entry for; pass that same `None` back to
/// [`restore_class_method`] to undo the swap.
pub fn swap_class_method(class: ClassId, sel: Selector, method: Method) -> Option<Method> {
    let mut store = STORE.write();
    let Some(def) = store.classes.get_mut(class) else {
        warn!("swap on unregistered class {:?}", class);
        return None;
    };
    let displaced = def.methods.insert(sel, method);
    trace!(
        "swapped {} on {} (displaced own entry: {})",
        sel,
        def.name,
        displaced.is_some()
    );
    displaced
}

/// Reverts [`swap_class_method`]: `Some` restores the displaced entry,
/// `None` removes the own-table entry so inherited resolution applies
/// again.
pub fn restore_class_method(class: ClassId, sel: Selector, displaced: Option<Method>) {
    let mut store = STORE.write();
    let Some(def) = store.classes.get_mut(class) else {
        return;
    };
    match displaced {
        Some(method) => {
            def.methods.insert(sel, method);
        }
        None => {
            def.methods.remove(&sel);
        }
    }
    trace!("restored {} on {}", sel, def.name);
}

/// Installs a per-object dispatch entry, shadowing the class chain for
/// this receiver only. Returns the override it displaced.
pub fn install_override(
    obj: ObjectRef,
    sel: Selector,
    method: Method,
) -> Result<Option<Method>, CallError> {
    let mut store = STORE.write();
    let cell = store
        .objects
        .get_mut(obj.id())
        .ok_or(CallError::DeadObject)?;
    let displaced = cell.overrides.insert(sel, method);
    trace!("installed override {} on {:?}", sel, obj);
    Ok(displaced)
}

/// Removes a per-object dispatch entry, returning it if present.
pub fn remove_override(obj: ObjectRef, sel: Selector) -> Result<Option<Method>, CallError> {
    let mut store = STORE.write();
    let cell = store
        .objects
        .get_mut(obj.id())
        .ok_or(CallError::DeadObject)?;
    let removed = cell.overrides.remove(&sel);
    trace!("removed override {} on {:?}", sel, obj);
    Ok(removed)
}

/// Current per-object entry for a selector, if one is installed.
pub fn override_for(obj: ObjectRef, sel: Selector) -> Option<Method> {
    STORE
        .read()
        .objects
        .get(obj.id())
        .and_then(|cell| cell.overrides.get(&sel).cloned())
}

/// Installs the process-wide destruction observer. A single slot; setting
/// it again replaces the previous observer.
///
/// The observer runs after the object's slot has been reclaimed and with no
/// store lock held, so it may freely call back into the store.
pub fn set_destroy_observer(observer: impl Fn(ObjectRef) + Send + Sync + 'static) {
    STORE.write().destroy_observer = Some(Arc::new(observer));
    debug!("destroy observer installed");
}

/// Dispatches a message: per-object override first, then the receiver's
/// class chain. The resolved implementation runs with no store lock held.
pub fn send(obj: ObjectRef, sel: Selector, args: &[Value]) -> Result<Value, CallError> {
    let method = {
        let store = STORE.read();
        let cell = store.objects.get(obj.id()).ok_or(CallError::DeadObject)?;
        match cell.overrides.get(&sel) {
            Some(method) => method.clone(),
            None => match store.resolve_in_chain(cell.class, sel) {
                Some((_, method)) => method,
                None => {
                    return Err(CallError::DoesNotRespond {
                        class: store.class_label(cell.class),
                        selector: sel.to_string(),
                    })
                }
            },
        }
    };

    if args.len() != method.arity() {
        return Err(CallError::ArityMismatch {
            selector: sel.to_string(),
            expected: method.arity(),
            given: args.len(),
        });
    }
    method.invoke(obj, args)
}

/// Destroys an object: dispatches `dealloc/0`, reclaims the slot, then
/// notifies the destroy observer.
///
/// `dealloc` runs while the object is still readable. A failure there is
/// logged and destruction continues; there is no partial teardown.
pub fn destroy(obj: ObjectRef) -> Result<(), CallError> {
    {
        let mut store = STORE.write();
        let cell = store
            .objects
            .get_mut(obj.id())
            .ok_or(CallError::DeadObject)?;
        if cell.dying {
            return Err(CallError::DeadObject);
        }
        cell.dying = true;
    }

    if let Err(err) = send(obj, builtin::dealloc(), &[]) {
        warn!("dealloc on {:?} raised: {}", obj, err);
    }

    let observer = {
        let mut store = STORE.write();
        store.objects.remove(obj.id());
        store.destroy_observer.clone()
    };
    debug!("destroyed {:?}", obj);
    if let Some(observer) = observer {
        observer(obj);
    }
    Ok(())
}

/// Reads a field of a live object.
pub fn get_field(obj: ObjectRef, field: &str) -> Option<Value> {
    STORE
        .read()
        .objects
        .get(obj.id())
        .and_then(|cell| cell.fields.get(field).cloned())
}

/// Writes a field of a live object, creating it on first write.
pub fn set_field(obj: ObjectRef, field: &str, value: Value) -> Result<(), CallError> {
    let mut store = STORE.write();
    let cell = store
        .objects
        .get_mut(obj.id())
        .ok_or(CallError::DeadObject)?;
    cell.fields.insert(field.to_string(), value);
    Ok(())
}

/// Removes a field of a live object, returning its value.
pub fn take_field(obj: ObjectRef, field: &str) -> Option<Value> {
    let mut store = STORE.write();
    store
        .objects
        .get_mut(obj.id())
        .and_then(|cell| cell.fields.remove(field))
}

/// Reference count of a live object.
pub fn refcount(obj: ObjectRef) -> Option<u32> {
    STORE.read().objects.get(obj.id()).map(|cell| cell.refcount)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::class::ClassBuilder;
    use crate::method;

    fn counter_class(name: &str) -> ClassId {
        ClassBuilder::new(name)
            .method(
                "incr",
                method!(|this, by: i64| -> i64 {
                    let next = this.get_int("count").unwrap_or(0) + by;
                    this.set("count", next)?;
                    next
                }),
            )
            .method("zero", method!(|_this| -> i64 { 0 }))
            .register()
    }

    #[test]
    fn test_alloc_dispatch_and_fields() {
        let class = counter_class("StoreCounterA");
        let obj = alloc(class).unwrap();
        assert!(obj.is_alive());
        assert_eq!(obj.class(), Some(class));

        assert_eq!(obj.call("incr", &[Value::Int(2)]).unwrap(), Value::Int(2));
        assert_eq!(obj.call("incr", &[Value::Int(3)]).unwrap(), Value::Int(5));
        assert_eq!(obj.get_int("count"), Some(5));

        assert_eq!(obj.take("count"), Some(Value::Int(5)));
        assert_eq!(obj.get("count"), None);
    }

    #[test]
    fn test_does_not_respond() {
        let class = counter_class("StoreCounterB");
        let obj = alloc(class).unwrap();
        let err = obj.call("missing", &[]).unwrap_err();
        assert!(matches!(err, CallError::DoesNotRespond { .. }));
        assert_eq!(
            err.to_string(),
            "StoreCounterB does not respond to missing/0"
        );
    }

    #[test]
    fn test_arity_is_part_of_the_selector() {
        let class = counter_class("StoreCounterC");
        let obj = alloc(class).unwrap();
        // incr/2 is a different selector than incr/1 and is not defined.
        let err = obj
            .call("incr", &[Value::Int(1), Value::Int(2)])
            .unwrap_err();
        assert!(matches!(err, CallError::DoesNotRespond { .. }));
    }

    #[test]
    fn test_arity_mismatch_via_raw_send() {
        let class = counter_class("StoreCounterD");
        let obj = alloc(class).unwrap();
        let sel = selector("incr", 1);
        let err = obj.send(sel, &[]).unwrap_err();
        assert!(matches!(
            err,
            CallError::ArityMismatch {
                expected: 1,
                given: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_inheritance_resolves_up_the_chain() {
        let parent = counter_class("StoreParentA");
        let child = ClassBuilder::new("StoreChildA")
            .superclass(parent)
            .method("zero", method!(|_this| -> i64 { 100 }))
            .register();

        let obj = alloc(child).unwrap();
        // Own entry wins over the inherited one.
        assert_eq!(obj.call("zero", &[]).unwrap(), Value::Int(100));
        // Inherited entry still reachable.
        assert_eq!(obj.call("incr", &[Value::Int(7)]).unwrap(), Value::Int(7));

        assert!(is_ancestor(parent, child));
        assert!(is_ancestor(root_class(), child));
        assert!(!is_ancestor(child, parent));
    }

    #[test]
    fn test_override_shadows_one_instance_only() {
        let class = counter_class("StoreCounterE");
        let hooked = alloc(class).unwrap();
        let plain = alloc(class).unwrap();

        let sel = selector("zero", 0);
        install_override(hooked, sel, Method::new(0, |_, _| Ok(Value::Int(42)))).unwrap();

        assert_eq!(hooked.call("zero", &[]).unwrap(), Value::Int(42));
        assert_eq!(plain.call("zero", &[]).unwrap(), Value::Int(0));

        let removed = remove_override(hooked, sel).unwrap();
        assert!(removed.is_some());
        assert_eq!(hooked.call("zero", &[]).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_swap_class_method_hits_all_instances() {
        let class = counter_class("StoreCounterF");
        let a = alloc(class).unwrap();
        let b = alloc(class).unwrap();

        let sel = selector("zero", 0);
        let displaced = swap_class_method(class, sel, Method::new(0, |_, _| Ok(Value::Int(-1))));
        assert!(displaced.is_some());

        assert_eq!(a.call("zero", &[]).unwrap(), Value::Int(-1));
        assert_eq!(b.call("zero", &[]).unwrap(), Value::Int(-1));

        restore_class_method(class, sel, displaced);
        assert_eq!(a.call("zero", &[]).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_swap_inherited_selector_restores_to_inherited() {
        let parent = counter_class("StoreParentB");
        let child = ClassBuilder::new("StoreChildB").superclass(parent).register();
        let obj = alloc(child).unwrap();

        let sel = selector("zero", 0);
        // Child has no own entry; the swap creates one.
        let displaced = swap_class_method(child, sel, Method::new(0, |_, _| Ok(Value::Int(9))));
        assert!(displaced.is_none());
        assert_eq!(obj.call("zero", &[]).unwrap(), Value::Int(9));

        // Restoring `None` removes the own entry and resolution falls back
        // to the parent.
        restore_class_method(child, sel, None);
        assert_eq!(obj.call("zero", &[]).unwrap(), Value::Int(0));
        let (owner, _) = resolve_owner(child, sel).unwrap();
        assert_eq!(owner, parent);
    }

    #[test]
    fn test_retain_release_lifecycle() {
        let class = counter_class("StoreCounterG");
        let obj = alloc(class).unwrap();
        assert_eq!(obj.refcount(), Some(1));

        obj.retain().unwrap();
        assert_eq!(obj.refcount(), Some(2));

        assert_eq!(obj.release().unwrap(), Value::Int(1));
        assert!(obj.is_alive());

        assert_eq!(obj.release().unwrap(), Value::Int(0));
        assert!(!obj.is_alive());
        assert!(matches!(obj.release(), Err(CallError::DeadObject)));
    }

    #[test]
    fn test_destroy_runs_dealloc_then_observer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let in_dealloc = Arc::clone(&log);
        let class = ClassBuilder::new("StoreDoomed")
            .method(
                "dealloc",
                Method::new(0, move |this, _| {
                    // The object is still readable mid-destruction.
                    let tag = this.get_str("tag").unwrap_or_default();
                    in_dealloc.lock().unwrap().push(format!("dealloc:{tag}"));
                    Ok(Value::Nil)
                }),
            )
            .register();

        let obj = alloc(class).unwrap();
        obj.set("tag", "x").unwrap();

        let in_observer = Arc::clone(&log);
        let target = obj;
        set_destroy_observer(move |gone| {
            if gone == target {
                in_observer.lock().unwrap().push("observer".to_string());
            }
        });

        obj.destroy().unwrap();
        assert!(!obj.is_alive());
        assert!(matches!(obj.destroy(), Err(CallError::DeadObject)));

        let log = log.lock().unwrap();
        assert_eq!(log.as_slice(), ["dealloc:x", "observer"]);
    }

    #[test]
    fn test_dead_handle_operations_fail_cleanly() {
        let class = counter_class("StoreCounterH");
        let obj = alloc(class).unwrap();
        obj.destroy().unwrap();

        assert!(matches!(
            obj.call("incr", &[Value::Int(1)]),
            Err(CallError::DeadObject)
        ));
        assert!(matches!(obj.set("x", 1i64), Err(CallError::DeadObject)));
        assert_eq!(obj.get("x"), None);
        assert_eq!(obj.class(), None);
        assert_eq!(obj.refcount(), None);
    }

    #[test]
    fn test_stale_handle_survives_slot_reuse() {
        let class = counter_class("StoreCounterI");
        let first = alloc(class).unwrap();
        first.destroy().unwrap();

        // Generation counters keep old handles dead even if the slot index
        // is recycled for new allocations.
        let _fresh: Vec<_> = (0..8).map(|_| alloc(class).unwrap()).collect();
        assert!(!first.is_alive());
        assert!(matches!(
            first.call("zero", &[]),
            Err(CallError::DeadObject)
        ));
    }

    #[test]
    fn test_class_by_name_and_root() {
        let class = counter_class("StoreCounterJ");
        assert_eq!(class_by_name("StoreCounterJ"), Some(class));
        assert_eq!(class_by_name("Object"), Some(root_class()));
        assert_eq!(class_name(class).as_deref(), Some("StoreCounterJ"));
        assert_eq!(superclass_of(class), Some(root_class()));
        assert_eq!(superclass_of(root_class()), None);
    }

    #[test]
    fn test_alloc_unregistered_class() {
        assert!(alloc(ClassId::default()).is_none());
    }
}
