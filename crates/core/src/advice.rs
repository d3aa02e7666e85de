//! Advice payloads
//!
//! An [`Advice`] pairs a callback with a declared parameter signature. The
//! callback flavor is fixed at construction: observation advice (for the
//! before and after positions) returns nothing, replacement advice (for
//! the instead position) produces the call's value. Flavor and signature
//! are both checked against the method at registration, never at call
//! time. At call time the body receives the invocation record plus the
//! leading arguments it declared, matched positionally.

use std::fmt;

use weft_runtime::{CallError, Value};

use crate::invocation::Invocation;

/// Observation callback. Runs around the original without replacing it.
/// The slice holds the declared leading arguments of the intercepted call.
pub type ObserveFn =
    Box<dyn Fn(&Invocation<'_>, &[Value]) -> Result<(), CallError> + Send + Sync>;

/// Replacement callback. Produces the intercepted call's return value.
/// The slice holds the declared leading arguments of the intercepted call.
pub type ReplaceFn =
    Box<dyn Fn(&Invocation<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync>;

enum Body {
    Observe(ObserveFn),
    Replace(ReplaceFn),
}

/// Callback flavor, fixed when the advice is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdviceKind {
    Observe,
    Replace,
}

/// What an aspect does when its position in the pipeline is reached.
pub struct Advice {
    body: Body,
    /// Leading arguments the callback declares an interest in. `None`
    /// means the signature is unknown and registration will refuse it.
    params: Option<usize>,
}

impl Advice {
    /// Observation advice that reads no arguments.
    pub fn observe(
        f: impl Fn(&Invocation<'_>) -> Result<(), CallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            body: Body::Observe(Box::new(move |inv, _| f(inv))),
            params: Some(0),
        }
    }

    /// Observation advice whose body receives the declared number of
    /// leading arguments.
    pub fn observe_args(
        params: usize,
        f: impl Fn(&Invocation<'_>, &[Value]) -> Result<(), CallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            body: Body::Observe(Box::new(f)),
            params: Some(params),
        }
    }

    /// Replacement advice producing the call's return value.
    pub fn replace(
        f: impl Fn(&Invocation<'_>) -> Result<Value, CallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            body: Body::Replace(Box::new(move |inv, _| f(inv))),
            params: Some(0),
        }
    }

    /// Replacement advice whose body receives the declared number of
    /// leading arguments.
    pub fn replace_args(
        params: usize,
        f: impl Fn(&Invocation<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            body: Body::Replace(Box::new(f)),
            params: Some(params),
        }
    }

    /// Observation advice with no declared signature.
    ///
    /// Adapters that erased the signature can still build an `Advice`, but
    /// registration refuses it until [`with_params`](Self::with_params)
    /// supplies one.
    pub fn observe_untyped(
        f: impl Fn(&Invocation<'_>, &[Value]) -> Result<(), CallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            body: Body::Observe(Box::new(f)),
            params: None,
        }
    }

    /// Replacement advice with no declared signature.
    pub fn replace_untyped(
        f: impl Fn(&Invocation<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            body: Body::Replace(Box::new(f)),
            params: None,
        }
    }

    /// Declares the parameter count after the fact.
    pub fn with_params(mut self, params: usize) -> Self {
        self.params = Some(params);
        self
    }

    pub(crate) fn params(&self) -> Option<usize> {
        self.params
    }

    pub(crate) fn kind(&self) -> AdviceKind {
        match self.body {
            Body::Observe(_) => AdviceKind::Observe,
            Body::Replace(_) => AdviceKind::Replace,
        }
    }

    /// Leading arguments the body declared, taken from the live call.
    fn prefix<'v>(&self, inv: &'v Invocation<'_>) -> &'v [Value] {
        let declared = self.params.unwrap_or(0).min(inv.args().len());
        &inv.args()[..declared]
    }

    /// Runs the advice in an observation slot. A replacement body has its
    /// value dropped, which registration rules out.
    pub(crate) fn observe_call(&self, inv: &Invocation<'_>) -> Result<(), CallError> {
        match &self.body {
            Body::Observe(f) => f(inv, self.prefix(inv)),
            Body::Replace(f) => f(inv, self.prefix(inv)).map(|_| ()),
        }
    }

    /// Runs the advice in the replacement slot. An observation body yields
    /// nil, which registration rules out.
    pub(crate) fn replace_call(&self, inv: &Invocation<'_>) -> Result<Value, CallError> {
        match &self.body {
            Body::Replace(f) => f(inv, self.prefix(inv)),
            Body::Observe(f) => f(inv, self.prefix(inv)).map(|_| Value::Nil),
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advice")
            .field("kind", &self.kind())
            .field("params", &self.params)
            .finish()
    }
}
