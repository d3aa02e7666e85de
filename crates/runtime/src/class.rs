//! Class definitions and method implementations
//!
//! Classes are registered once and never removed, so a [`ClassId`] stays
//! valid for the life of the process. Methods are plain closures behind an
//! [`Arc`]; the same [`Method`] value can be installed in several dispatch
//! tables at once, which is exactly what method swapping relies on.

use std::fmt;
use std::sync::Arc;

use slotmap::new_key_type;

use crate::error::CallError;
use crate::object::ObjectRef;
use crate::store;
use crate::value::Value;

new_key_type! {
    /// Generation-counted handle to a registered class.
    pub struct ClassId;
}

/// Implementation signature shared by every method.
pub type Imp = Arc<dyn Fn(ObjectRef, &[Value]) -> Result<Value, CallError> + Send + Sync>;

/// A callable method: declared arity plus the implementation closure.
#[derive(Clone)]
pub struct Method {
    arity: usize,
    imp: Imp,
}

impl Method {
    /// Wraps a closure as a method of the given arity.
    ///
    /// Most code goes through the [`method!`](crate::method) macro instead,
    /// which derives the arity and unpacks typed parameters.
    pub fn new(
        arity: usize,
        imp: impl Fn(ObjectRef, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            arity,
            imp: Arc::new(imp),
        }
    }

    /// Declared argument count.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Calls the implementation directly, without arity checking.
    ///
    /// Dispatch validates argument counts before it gets here; callers that
    /// bypass dispatch are expected to do the same.
    pub fn invoke(&self, receiver: ObjectRef, args: &[Value]) -> Result<Value, CallError> {
        (self.imp)(receiver, args)
    }

    /// Whether two values share one implementation closure.
    pub fn same_imp(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.imp, &other.imp)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("arity", &self.arity).finish()
    }
}

/// Builder for registering a class with the global store.
///
/// ```
/// use weft_runtime::{ClassBuilder, method};
///
/// let counter = ClassBuilder::new("Counter")
///     .method("incr", method!(|this, by: i64| -> i64 {
///         let n = this.get_int("count").unwrap_or(0) + by;
///         this.set("count", n)?;
///         n
///     }))
///     .register();
/// ```
pub struct ClassBuilder {
    name: String,
    superclass: Option<ClassId>,
    methods: Vec<(String, Method)>,
}

impl ClassBuilder {
    /// Starts a class definition. Without [`superclass`](Self::superclass)
    /// the class inherits from the root class.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            methods: Vec::new(),
        }
    }

    /// Sets the parent class.
    pub fn superclass(mut self, parent: ClassId) -> Self {
        self.superclass = Some(parent);
        self
    }

    /// Adds a method. The selector is formed from the name and the
    /// method's arity, so `incr/0` and `incr/1` coexist.
    pub fn method(mut self, name: impl Into<String>, method: Method) -> Self {
        self.methods.push((name.into(), method));
        self
    }

    /// Registers the class and returns its permanent handle.
    pub fn register(self) -> ClassId {
        store::register_class(self.name, self.superclass, self.methods)
    }
}
