//! Call pipeline execution
//!
//! A trampoline lands here. The pipeline takes a snapshot of the relevant
//! aspect lists under a brief registry read lock, drops the lock, and only
//! then runs advice and the original implementation. User code therefore
//! never executes while any engine lock is held, and hooks added or
//! removed mid-call affect the next call, not this one.
//!
//! Stage order: before advice front to back, then the first live instead
//! advice (or the original when none), then after advice front to back.
//! Any advice error aborts the remaining stages and becomes the call's
//! result.

use std::sync::Arc;

use tracing::trace;

use weft_runtime::{store, CallError, ClassId, Method, ObjectRef, Selector, Value};

use crate::entry::AspectEntry;
use crate::invocation::Invocation;
use crate::options::Position;
use crate::registry::{self, TokenId};

/// Call-time view of the merged aspect lists for one dispatch.
///
/// Entries are `Arc`s shared with the registry; holding the snapshot keeps
/// them callable even if they are removed while this call is in flight.
pub(crate) struct Snapshot {
    pub(crate) before: Vec<(TokenId, Arc<AspectEntry>)>,
    pub(crate) instead: Vec<(TokenId, Arc<AspectEntry>)>,
    pub(crate) after: Vec<(TokenId, Arc<AspectEntry>)>,
    pub(crate) original: Method,
}

/// Entry point of class-wide trampolines.
pub(crate) fn dispatch_class(
    class: ClassId,
    selector: Selector,
    receiver: ObjectRef,
    args: &[Value],
) -> Result<Value, CallError> {
    match registry::snapshot_class(class, selector) {
        Some(snapshot) => run(&snapshot, receiver, selector, args),
        // The container vanished between dispatch resolution and this
        // call. The class table has been restored, so a fresh send
        // resolves to whatever is current.
        None => {
            trace!("no container for {} on {:?}, passing through", selector, class);
            store::send(receiver, selector, args)
        }
    }
}

/// Entry point of single-instance trampolines.
pub(crate) fn dispatch_instance(
    object: ObjectRef,
    selector: Selector,
    receiver: ObjectRef,
    args: &[Value],
) -> Result<Value, CallError> {
    match registry::snapshot_instance(object, selector) {
        Some(snapshot) => run(&snapshot, receiver, selector, args),
        None => {
            trace!("no container for {} on {:?}, passing through", selector, object);
            store::send(receiver, selector, args)
        }
    }
}

fn run(
    snapshot: &Snapshot,
    receiver: ObjectRef,
    selector: Selector,
    args: &[Value],
) -> Result<Value, CallError> {
    let invocation = Invocation::new(receiver, selector, args, &snapshot.original);
    let mut ran_auto: Vec<TokenId> = Vec::new();

    let result = run_stages(snapshot, &invocation, &mut ran_auto);

    // Entries flagged for automatic removal come out after the call they
    // took part in, whether it succeeded or not.
    for token in ran_auto {
        registry::auto_remove(token);
    }
    result
}

/// Whether this call may run the entry. One-shot entries are claimed
/// here, before their advice runs: of several overlapping calls holding
/// the same snapshot, only the claim winner fires the advice.
fn claim(token: TokenId, entry: &AspectEntry, ran_auto: &mut Vec<TokenId>) -> bool {
    if !entry.automatic_removal() {
        return entry.is_alive();
    }
    if !entry.deactivate() {
        return false;
    }
    ran_auto.push(token);
    true
}

fn run_stages(
    snapshot: &Snapshot,
    invocation: &Invocation<'_>,
    ran_auto: &mut Vec<TokenId>,
) -> Result<Value, CallError> {
    for (token, entry) in &snapshot.before {
        if !claim(*token, entry, ran_auto) {
            continue;
        }
        entry.advice.observe_call(invocation)?;
    }

    // The first live instead advice claims the call; the original only
    // runs when none does (or when the advice invokes it explicitly).
    invocation.enter(Position::Instead);
    let mut replacement = None;
    for (token, entry) in &snapshot.instead {
        if !claim(*token, entry, ran_auto) {
            continue;
        }
        replacement = Some(entry.advice.replace_call(invocation)?);
        break;
    }

    let value = match replacement {
        Some(value) => value,
        None => invocation.invoke_original()?,
    };
    invocation.record_return(&value);
    invocation.enter(Position::After);

    for (token, entry) in &snapshot.after {
        if !claim(*token, entry, ran_auto) {
            continue;
        }
        entry.advice.observe_call(invocation)?;
    }

    Ok(value)
}
