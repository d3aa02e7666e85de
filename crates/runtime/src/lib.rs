//! weft runtime - a small dynamic object model
//!
//! Classes are registered at runtime, instances live in a process-wide
//! store, and every call goes through selector-based dispatch. Nothing here
//! knows about interception; what this crate guarantees is the surface the
//! engine in `weft-core` attaches to:
//!
//! - per-object dispatch entries that shadow the class chain
//!   ([`store::install_override`])
//! - swappable class method tables ([`store::swap_class_method`])
//! - generation-counted handles that fail cleanly after destruction
//! - a destruction observer that fires after an object's slot is reclaimed
//!
//! ```
//! use weft_runtime::{method, store, ClassBuilder, Value};
//!
//! let counter = ClassBuilder::new("Counter")
//!     .method("incr", method!(|this, by: i64| -> i64 {
//!         let next = this.get_int("count").unwrap_or(0) + by;
//!         this.set("count", next)?;
//!         next
//!     }))
//!     .register();
//!
//! let obj = store::alloc(counter).unwrap();
//! assert_eq!(obj.call("incr", &[Value::Int(5)]).unwrap(), Value::Int(5));
//! ```

pub mod class;
pub mod error;
mod macros;
pub mod object;
pub mod selector;
pub mod store;
pub mod value;

pub use class::{ClassBuilder, ClassId, Imp, Method};
pub use error::CallError;
pub use object::ObjectRef;
pub use selector::{selector, Selector};
pub use store::builtin;
pub use value::{FromValue, IntoValue, Value};
