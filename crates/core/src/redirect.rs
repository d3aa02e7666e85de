//! Dispatch redirection
//!
//! Two redirect shapes exist. A class-wide redirect swaps a trampoline
//! into the class's own method table, so every instance (subclasses
//! included) routes through the engine. A single-instance redirect
//! installs the trampoline as a per-object dispatch override, leaving the
//! class and its other instances untouched.
//!
//! Trampolines capture where they were installed, not what to run: the
//! aspect lists are looked up per call, so stacking and removal take
//! effect without reinstalling anything.

use tracing::{trace, warn};

use weft_runtime::{store, CallError, ClassId, Method, ObjectRef, Selector};

use crate::pipeline;

/// Builds the trampoline for a class-wide redirect.
fn class_trampoline(class: ClassId, selector: Selector) -> Method {
    Method::new(selector.arity(), move |receiver, args| {
        pipeline::dispatch_class(class, selector, receiver, args)
    })
}

/// Builds the trampoline for a single-instance redirect.
fn instance_trampoline(object: ObjectRef, selector: Selector) -> Method {
    Method::new(selector.arity(), move |receiver, args| {
        pipeline::dispatch_instance(object, selector, receiver, args)
    })
}

/// Swaps the class trampoline in, returning the own-table entry it
/// displaced (`None` when the selector was inherited).
pub(crate) fn install_class_redirect(class: ClassId, selector: Selector) -> Option<Method> {
    let displaced = store::swap_class_method(class, selector, class_trampoline(class, selector));
    trace!("class redirect installed for {} on {:?}", selector, class);
    displaced
}

/// Puts the class method table back the way the install found it.
pub(crate) fn uninstall_class_redirect(
    class: ClassId,
    selector: Selector,
    displaced: Option<Method>,
) {
    store::restore_class_method(class, selector, displaced);
    trace!("class redirect removed for {} on {:?}", selector, class);
}

/// Installs the per-object trampoline, returning any override it
/// shadowed. Fails when the object is no longer alive.
pub(crate) fn install_instance_redirect(
    object: ObjectRef,
    selector: Selector,
) -> Result<Option<Method>, CallError> {
    let displaced = store::install_override(object, selector, instance_trampoline(object, selector))?;
    trace!("instance redirect installed for {} on {:?}", selector, object);
    Ok(displaced)
}

/// Removes the per-object trampoline and reinstates a shadowed override.
///
/// An object destroyed in the meantime took its override table with it;
/// that case is quietly complete.
pub(crate) fn uninstall_instance_redirect(
    object: ObjectRef,
    selector: Selector,
    displaced: Option<Method>,
) {
    match store::remove_override(object, selector) {
        Ok(_) => {
            if let Some(previous) = displaced {
                if let Err(err) = store::install_override(object, selector, previous) {
                    trace!(
                        "could not reinstate shadowed override for {} on {:?}: {}",
                        selector,
                        object,
                        err
                    );
                }
            }
            trace!("instance redirect removed for {} on {:?}", selector, object);
        }
        Err(CallError::DeadObject) => {
            trace!(
                "instance redirect for {} on {:?} gone with the object",
                selector,
                object
            );
        }
        Err(err) => {
            warn!(
                "failed to remove instance redirect for {} on {:?}: {}",
                selector,
                object,
                err
            );
        }
    }
}
