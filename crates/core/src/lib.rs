//! Weft - Method Interception
//!
//! This crate layers aspect-oriented method interception on top of the
//! [`weft_runtime`] object model: advice can be attached before, instead
//! of, or after any method of a single object or a whole class, without
//! touching the method's implementation.
//!
//! Hooks stack, apply to calls already in flight only from the next call
//! on, and come with a token that removes exactly that registration
//! again. Destroying an object cleans its hooks up on its own.
//!
//! # Example
//!
//! ```
//! use weft_core::{hook_object, Advice, AspectOptions};
//! use weft_runtime::{method, selector, ClassBuilder, Value};
//!
//! let class = ClassBuilder::new("CrateDocGreeter")
//!     .method(
//!         "greet",
//!         method!(|_this, name: String| -> String {
//!             format!("hello, {name}")
//!         }),
//!     )
//!     .register();
//! let greeter = weft_runtime::store::alloc(class).unwrap();
//!
//! let token = hook_object(
//!     greeter,
//!     selector("greet", 1),
//!     AspectOptions::AFTER,
//!     Advice::observe(|inv| {
//!         println!("greet returned {:?}", inv.return_value());
//!         Ok(())
//!     }),
//! )?;
//!
//! let out = greeter.call("greet", &[Value::Str("ada".into())]).unwrap();
//! assert_eq!(out, Value::Str("hello, ada".into()));
//!
//! token.remove()?;
//! # Ok::<(), weft_core::AspectError>(())
//! ```

pub mod advice;
pub mod error;
pub mod invocation;
pub mod options;
pub mod registry;
pub mod report;
pub mod token;

mod container;
mod entry;
mod pipeline;
mod redirect;

// Re-export commonly used items
pub use advice::Advice;
pub use error::AspectError;
pub use invocation::Invocation;
pub use options::{AspectOptions, Position};
pub use registry::{
    class_has_aspects, hook_class, hook_object, live_entry_count, object_has_aspects, unhook,
};
pub use report::{registry_report, ContainerReport, RegistryReport};
pub use token::AspectToken;
