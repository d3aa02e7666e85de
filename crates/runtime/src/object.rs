//! Object handles
//!
//! An [`ObjectRef`] is a generation-counted index into the global store, not
//! a pointer. Copies are free, and a handle left over after its object is
//! destroyed simply stops resolving instead of dangling.

use std::fmt;

use slotmap::{new_key_type, Key};

use crate::class::ClassId;
use crate::error::CallError;
use crate::selector::{selector, Selector};
use crate::store;
use crate::value::Value;

new_key_type! {
    /// Slot key for an object cell. Internal; the public handle is
    /// [`ObjectRef`].
    pub(crate) struct ObjectId;
}

/// Handle to an object in the global store.
///
/// Handles stay valid as identifiers after the object dies; operations on a
/// dead handle return [`CallError::DeadObject`] rather than touching
/// recycled storage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    id: ObjectId,
}

impl ObjectRef {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self { id }
    }

    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }

    /// A handle that never resolves. Useful as a placeholder receiver.
    pub fn null() -> Self {
        Self {
            id: ObjectId::null(),
        }
    }

    /// Whether the object behind this handle still exists.
    pub fn is_alive(&self) -> bool {
        store::is_alive(*self)
    }

    /// Class of the object, or `None` once it has been destroyed.
    pub fn class(&self) -> Option<ClassId> {
        store::class_of(*self)
    }

    /// Class name of the object, or `None` once it has been destroyed.
    pub fn class_name(&self) -> Option<String> {
        self.class().and_then(store::class_name)
    }

    /// Dispatches a message by name, forming the selector from the argument
    /// count.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, CallError> {
        self.send(selector(name, args.len()), args)
    }

    /// Dispatches a message with an already interned selector.
    pub fn send(&self, sel: Selector, args: &[Value]) -> Result<Value, CallError> {
        store::send(*self, sel, args)
    }

    /// Reads a named field.
    pub fn get(&self, field: &str) -> Option<Value> {
        store::get_field(*self, field)
    }

    /// Reads a named field as an integer.
    pub fn get_int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(|v| v.as_int())
    }

    /// Reads a named field as a boolean.
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(|v| v.as_bool())
    }

    /// Reads a named field as a float.
    pub fn get_float(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(|v| v.as_float())
    }

    /// Reads a named field as a string.
    pub fn get_str(&self, field: &str) -> Option<String> {
        self.get(field)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Writes a named field, creating it on first write.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<(), CallError> {
        store::set_field(*self, field, value.into())
    }

    /// Removes a named field, returning its value.
    pub fn take(&self, field: &str) -> Option<Value> {
        store::take_field(*self, field)
    }

    /// Increments the reference count via the `retain/0` message.
    pub fn retain(&self) -> Result<Value, CallError> {
        self.send(store::builtin::retain(), &[])
    }

    /// Decrements the reference count via the `release/0` message. The
    /// object is destroyed when the count reaches zero.
    pub fn release(&self) -> Result<Value, CallError> {
        self.send(store::builtin::release(), &[])
    }

    /// Current reference count, or `None` once destroyed.
    pub fn refcount(&self) -> Option<u32> {
        store::refcount(*self)
    }

    /// Forcibly destroys the object regardless of its reference count.
    pub fn destroy(&self) -> Result<(), CallError> {
        store::destroy(*self)
    }

    /// Human readable description via the `description/0` message, with a
    /// fallback for dead objects.
    pub fn description(&self) -> String {
        match self.send(store::builtin::description(), &[]) {
            Ok(Value::Str(s)) => s,
            Ok(other) => other.to_string(),
            Err(_) => format!("{self}"),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:?})", self.id.data())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class_name() {
            Some(name) => write!(f, "<{} {:?}>", name, self.id.data()),
            None => write!(f, "<dead {:?}>", self.id.data()),
        }
    }
}
