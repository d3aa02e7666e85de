//! Invocation records handed to advice callbacks
//!
//! An [`Invocation`] describes one intercepted call: the receiver, the
//! selector, the argument list, and a handle on the displaced original
//! implementation. It lives on the stack of the intercepted call; advice
//! that needs the arguments beyond the call takes an owned snapshot via
//! [`Invocation::arguments`].

use std::cell::{Cell, OnceCell};
use std::fmt;
use std::sync::Arc;

use weft_runtime::{CallError, Method, ObjectRef, Selector, Value};

use crate::options::Position;

/// A single intercepted call.
pub struct Invocation<'a> {
    receiver: ObjectRef,
    selector: Selector,
    args: &'a [Value],
    original: &'a Method,
    /// Stage the pipeline is currently running; gates original invocation.
    phase: Cell<Position>,
    /// Built on first request, shared by later ones.
    boxed_args: OnceCell<Arc<[Value]>>,
    /// Set once the original (or a replacement) has produced a value.
    returned: OnceCell<Value>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        receiver: ObjectRef,
        selector: Selector,
        args: &'a [Value],
        original: &'a Method,
    ) -> Self {
        Self {
            receiver,
            selector,
            args,
            original,
            phase: Cell::new(Position::Before),
            boxed_args: OnceCell::new(),
            returned: OnceCell::new(),
        }
    }

    pub(crate) fn enter(&self, phase: Position) {
        self.phase.set(phase);
    }

    /// Object the intercepted message was sent to.
    pub fn receiver(&self) -> ObjectRef {
        self.receiver
    }

    /// Selector of the intercepted message.
    pub fn selector(&self) -> Selector {
        self.selector
    }

    /// Arguments of the intercepted call.
    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// Single argument by index.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Owned, shareable snapshot of the arguments.
    ///
    /// The snapshot is materialized on the first request and every later
    /// call returns the same allocation, so advice can stash it past the
    /// end of the call without paying per-caller copies.
    pub fn arguments(&self) -> Arc<[Value]> {
        self.boxed_args.get_or_init(|| Arc::from(self.args)).clone()
    }

    /// Value the call produced, visible to after advice. `None` while the
    /// original has not completed.
    pub fn return_value(&self) -> Option<&Value> {
        self.returned.get()
    }

    pub(crate) fn record_return(&self, value: &Value) {
        let _ = self.returned.set(value.clone());
    }

    /// Invokes the displaced original implementation with the original
    /// arguments.
    ///
    /// Only instead advice owns the call and may run the original; from
    /// before or after advice this fails without running anything.
    pub fn invoke_original(&self) -> Result<Value, CallError> {
        self.original()?.invoke(self.receiver, self.args)
    }

    /// Invokes the displaced original implementation with substituted
    /// arguments. The count must match the original's arity.
    ///
    /// Same stage rule as [`invoke_original`](Self::invoke_original).
    pub fn invoke_original_with(&self, args: &[Value]) -> Result<Value, CallError> {
        let original = self.original()?;
        if args.len() != original.arity() {
            return Err(CallError::ArityMismatch {
                selector: self.selector.to_string(),
                expected: original.arity(),
                given: args.len(),
            });
        }
        original.invoke(self.receiver, args)
    }

    fn original(&self) -> Result<&Method, CallError> {
        match self.phase.get() {
            Position::Instead => Ok(self.original),
            phase => Err(CallError::raised(format!(
                "the original of {} can only be invoked from instead advice, not {} advice",
                self.selector, phase
            ))),
        }
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("receiver", &self.receiver)
            .field("selector", &self.selector)
            .field("args", &self.args)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_arguments_share_one_allocation() {
        let original = Method::new(2, |_, _| Ok(Value::Nil));
        let args = [Value::Int(1), Value::Str("x".into())];
        let inv = Invocation::new(
            ObjectRef::null(),
            weft_runtime::selector("inv_lazy", 2),
            &args,
            &original,
        );

        let first = inv.arguments();
        let second = inv.arguments();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(&*first, inv.args());
    }

    #[test]
    fn test_invoke_original_with_checks_arity() {
        let original = Method::new(1, |_, args| Ok(args[0].clone()));
        let args = [Value::Int(7)];
        let inv = Invocation::new(
            ObjectRef::null(),
            weft_runtime::selector("inv_arity", 1),
            &args,
            &original,
        );
        inv.enter(Position::Instead);

        assert_eq!(
            inv.invoke_original_with(&[Value::Int(9)]).unwrap(),
            Value::Int(9)
        );
        assert!(matches!(
            inv.invoke_original_with(&[]),
            Err(CallError::ArityMismatch { expected: 1, given: 0, .. })
        ));
    }

    #[test]
    fn test_original_is_gated_to_the_instead_stage() {
        let original = Method::new(0, |_, _| Ok(Value::Int(1)));
        let inv = Invocation::new(
            ObjectRef::null(),
            weft_runtime::selector("inv_gate", 0),
            &[],
            &original,
        );

        // Fresh records sit in the before stage.
        assert!(inv.invoke_original().is_err());

        inv.enter(Position::Instead);
        assert_eq!(inv.invoke_original().unwrap(), Value::Int(1));

        inv.enter(Position::After);
        assert!(inv.invoke_original().is_err());
        assert!(inv.invoke_original_with(&[]).is_err());
    }

    #[test]
    fn test_return_value_set_once() {
        let original = Method::new(0, |_, _| Ok(Value::Nil));
        let inv = Invocation::new(
            ObjectRef::null(),
            weft_runtime::selector("inv_ret", 0),
            &[],
            &original,
        );
        assert!(inv.return_value().is_none());
        inv.record_return(&Value::Int(3));
        assert_eq!(inv.return_value(), Some(&Value::Int(3)));
    }
}
