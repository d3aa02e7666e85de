//! Aspect registry
//!
//! One process-wide registry tracks every installed aspect: a slot map of
//! entries (the backing of tokens) plus a container per hooked
//! `(target, selector)` pair. All mutation happens under the registry
//! write lock, and dispatch-table edits in the object store are only ever
//! made while that lock is held, so a call either sees a hook completely
//! installed or not at all.
//!
//! Lock order is registry before store, everywhere. Pipelines take the
//! registry read lock only to snapshot and never call user code under it.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Once};

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, info, trace, warn};

use weft_runtime::{store, CallError, ClassId, ObjectRef, Selector};

use crate::advice::{Advice, AdviceKind};
use crate::container::{Anchor, AspectContainer};
use crate::entry::AspectEntry;
use crate::error::AspectError;
use crate::options::{AspectOptions, Position};
use crate::pipeline::Snapshot;
use crate::redirect;
use crate::report::{ContainerReport, RegistryReport};
use crate::token::AspectToken;

new_key_type! {
    /// Slot key behind an [`AspectToken`].
    pub(crate) struct TokenId;
}

/// What a hook attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TargetKey {
    Class(ClassId),
    Instance(ObjectRef),
}

enum Slot {
    Live(Arc<AspectEntry>),
    /// Left behind when the target object was destroyed with hooks still
    /// installed. The first removal attempt reports the destruction and
    /// reclaims the slot.
    Orphaned,
}

struct Registry {
    entries: SlotMap<TokenId, Slot>,
    containers: HashMap<(TargetKey, Selector), AspectContainer>,
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| {
    RwLock::new(Registry {
        entries: SlotMap::with_key(),
        containers: HashMap::new(),
    })
});

/// The store's destroy observer is claimed once, by the first instance
/// hook.
static PURGE_OBSERVER: Once = Once::new();

fn ensure_purge_observer() {
    PURGE_OBSERVER.call_once(|| {
        store::set_destroy_observer(purge_destroyed);
        debug!("aspect purge observer registered with the object store");
    });
}

/// Placement and selector rules, shared by both hook flavors. Signature
/// checks follow separately once the target is known to respond.
fn validate(selector: Selector, options: AspectOptions) -> Result<Position, AspectError> {
    let position = options.position()?;

    if selector == store::builtin::retain() || selector == store::builtin::release() {
        return Err(AspectError::SelectorBlacklisted(selector.to_string()));
    }
    if selector == store::builtin::dealloc() && position != Position::Before {
        return Err(AspectError::DeallocPosition);
    }
    Ok(position)
}

fn validate_signature(
    selector: Selector,
    position: Position,
    advice: &Advice,
) -> Result<(), AspectError> {
    let Some(params) = advice.params() else {
        return Err(AspectError::MissingAdviceSignature);
    };
    match (position, advice.kind()) {
        (Position::Instead, AdviceKind::Observe) => {
            return Err(AspectError::IncompatibleAdviceSignature(
                "instead advice must produce a replacement value".to_string(),
            ));
        }
        (Position::Before | Position::After, AdviceKind::Replace) => {
            return Err(AspectError::IncompatibleAdviceSignature(format!(
                "{position} advice cannot replace the return value"
            )));
        }
        _ => {}
    }
    if params > selector.arity() {
        return Err(AspectError::IncompatibleAdviceSignature(format!(
            "advice reads {} arguments, {} carries {}",
            params,
            selector,
            selector.arity()
        )));
    }
    Ok(())
}

fn class_label(class: ClassId) -> String {
    store::class_name(class).unwrap_or_else(|| "<unknown class>".to_string())
}

/// Hooks a selector on a single object. Other instances of its class are
/// unaffected.
///
/// Advice stacks: hooking the same `(object, selector)` again appends to
/// the pipeline. The returned token revokes exactly this registration.
pub fn hook_object(
    object: ObjectRef,
    selector: Selector,
    options: AspectOptions,
    advice: Advice,
) -> Result<AspectToken, AspectError> {
    let position = validate(selector, options)?;

    let class = store::class_of(object).ok_or(AspectError::ObjectAlreadyDestroyed)?;
    if !store::responds_to(class, selector) && store::override_for(object, selector).is_none() {
        return Err(AspectError::DoesNotRespondToSelector {
            class: class_label(class),
            selector: selector.to_string(),
        });
    }
    validate_signature(selector, position, &advice)?;

    ensure_purge_observer();

    let mut registry = REGISTRY.write();
    let key = (TargetKey::Instance(object), selector);

    if !registry.containers.contains_key(&key) {
        let displaced = match redirect::install_instance_redirect(object, selector) {
            Ok(displaced) => displaced,
            Err(CallError::DeadObject) => return Err(AspectError::ObjectAlreadyDestroyed),
            Err(err) => {
                return Err(AspectError::FailedToExtendInstance {
                    object: format!("{object:?}"),
                    source: err,
                });
            }
        };
        // True original: a pre-existing override wins, then a class-wide
        // redirect anywhere on the chain is unwound to its own original,
        // then plain chain resolution.
        let original = displaced
            .clone()
            .or_else(|| chain_container_original(&registry, class, selector))
            .or_else(|| store::resolve_method(class, selector));
        let Some(original) = original else {
            redirect::uninstall_instance_redirect(object, selector, displaced);
            return Err(AspectError::DoesNotRespondToSelector {
                class: class_label(class),
                selector: selector.to_string(),
            });
        };
        registry.containers.insert(
            key,
            AspectContainer::new(original, Anchor::Instance { object, displaced }),
        );
        trace!("created instance container for {} on {:?}", selector, object);
    }

    let entry = Arc::new(AspectEntry::new(
        TargetKey::Instance(object),
        selector,
        position,
        options,
        advice,
    ));
    let id = registry.entries.insert(Slot::Live(entry));
    if let Some(container) = registry.containers.get_mut(&key) {
        container.add(position, id);
    }
    info!("hooked {} advice on {} for {:?}", position, selector, object);
    Ok(AspectToken::new(id))
}

/// Hooks a selector class-wide: every instance of the class and its
/// subclasses routes through the pipeline.
///
/// A selector can carry a class-wide hook at only one level of a
/// hierarchy; hooking it again on a superclass or subclass is refused.
pub fn hook_class(
    class: ClassId,
    selector: Selector,
    options: AspectOptions,
    advice: Advice,
) -> Result<AspectToken, AspectError> {
    let position = validate(selector, options)?;

    if !store::responds_to(class, selector) {
        return Err(AspectError::DoesNotRespondToSelector {
            class: class_label(class),
            selector: selector.to_string(),
        });
    }

    let mut registry = REGISTRY.write();
    for (other, sel) in registry.containers.keys() {
        let TargetKey::Class(other) = *other else {
            continue;
        };
        if *sel != selector || other == class {
            continue;
        }
        if store::is_ancestor(other, class) || store::is_ancestor(class, other) {
            return Err(AspectError::AlreadyHookedInClassHierarchy {
                selector: selector.to_string(),
                class: class_label(class),
                hooked: class_label(other),
            });
        }
    }
    validate_signature(selector, position, &advice)?;

    let key = (TargetKey::Class(class), selector);
    if !registry.containers.contains_key(&key) {
        // The hierarchy check above guarantees plain resolution cannot hit
        // another trampoline.
        let Some(original) = store::resolve_method(class, selector) else {
            return Err(AspectError::DoesNotRespondToSelector {
                class: class_label(class),
                selector: selector.to_string(),
            });
        };
        let displaced = redirect::install_class_redirect(class, selector);
        registry.containers.insert(
            key,
            AspectContainer::new(original, Anchor::Class { class, displaced }),
        );
        trace!("created class container for {} on {:?}", selector, class);
    }

    let entry = Arc::new(AspectEntry::new(
        TargetKey::Class(class),
        selector,
        position,
        options,
        advice,
    ));
    let id = registry.entries.insert(Slot::Live(entry));
    if let Some(container) = registry.containers.get_mut(&key) {
        container.add(position, id);
    }
    info!(
        "hooked {} advice on {} for class {}",
        position,
        selector,
        class_label(class)
    );
    Ok(AspectToken::new(id))
}

/// Removes a registration.
///
/// `Ok(true)` when this call removed it, `Ok(false)` when the token was
/// already spent. A token whose object was destroyed first reports
/// [`AspectError::ObjectAlreadyDestroyed`] once, then behaves spent.
pub fn unhook(token: AspectToken) -> Result<bool, AspectError> {
    let mut registry = REGISTRY.write();
    match registry.entries.remove(token.id()) {
        None => Ok(false),
        Some(Slot::Orphaned) => Err(AspectError::ObjectAlreadyDestroyed),
        Some(Slot::Live(entry)) => {
            entry.deactivate();
            detach_from_container(&mut registry, token.id(), &entry);
            info!(
                "unhooked {} advice on {} from {:?}",
                entry.position, entry.selector, entry.target
            );
            Ok(true)
        }
    }
}

/// Pipeline-side removal of a one-shot entry the call path already
/// claimed. Unlike [`unhook`] this never reclaims an orphaned slot;
/// destruction reporting stays with the token holder.
pub(crate) fn auto_remove(id: TokenId) {
    let mut registry = REGISTRY.write();
    let is_live = matches!(registry.entries.get(id), Some(Slot::Live(_)));
    if !is_live {
        return;
    }
    if let Some(Slot::Live(entry)) = registry.entries.remove(id) {
        detach_from_container(&mut registry, id, &entry);
        debug!(
            "auto-removed {} advice from {:?} after first call",
            entry.selector, entry.target
        );
    }
}

/// Takes the entry out of its container, tearing the redirect down when
/// the container empties. Caller holds the write lock.
fn detach_from_container(registry: &mut Registry, id: TokenId, entry: &AspectEntry) {
    let key = (entry.target, entry.selector);
    let emptied = match registry.containers.get_mut(&key) {
        Some(container) => {
            if !container.remove(id) {
                warn!("entry for {} missing from its container", entry.selector);
            }
            container.is_empty()
        }
        None => false,
    };
    if !emptied {
        return;
    }
    if let Some(container) = registry.containers.remove(&key) {
        match container.anchor {
            Anchor::Class { class, displaced } => {
                redirect::uninstall_class_redirect(class, entry.selector, displaced);
            }
            Anchor::Instance { object, displaced } => {
                redirect::uninstall_instance_redirect(object, entry.selector, displaced);
            }
        }
        debug!("container for {} on {:?} emptied", entry.selector, entry.target);
    }
}

/// Destroy observer: drops every container of the destroyed object and
/// turns its entries into orphans. The object's dispatch overrides died
/// with it, so no table needs restoring.
fn purge_destroyed(object: ObjectRef) {
    let mut registry = REGISTRY.write();
    let keys: Vec<_> = registry
        .containers
        .keys()
        .filter(|(target, _)| *target == TargetKey::Instance(object))
        .copied()
        .collect();
    if keys.is_empty() {
        return;
    }

    let mut orphaned = 0usize;
    for key in keys {
        if let Some(container) = registry.containers.remove(&key) {
            for id in container.tokens() {
                if let Some(slot) = registry.entries.get_mut(id) {
                    if let Slot::Live(entry) = slot {
                        entry.deactivate();
                    }
                    *slot = Slot::Orphaned;
                    orphaned += 1;
                }
            }
        }
    }
    debug!("orphaned {} aspects of destroyed {:?}", orphaned, object);
}

/// Chain lookup for a class-wide container covering `selector` for
/// instances of `class`.
fn chain_container<'a>(
    registry: &'a Registry,
    class: ClassId,
    selector: Selector,
) -> Option<&'a AspectContainer> {
    let mut cursor = Some(class);
    while let Some(id) = cursor {
        if let Some(container) = registry.containers.get(&(TargetKey::Class(id), selector)) {
            return Some(container);
        }
        cursor = store::superclass_of(id);
    }
    None
}

fn chain_container_original(
    registry: &Registry,
    class: ClassId,
    selector: Selector,
) -> Option<weft_runtime::Method> {
    chain_container(registry, class, selector).map(|container| container.original.clone())
}

fn collect(registry: &Registry, ids: &[TokenId]) -> Vec<(TokenId, Arc<AspectEntry>)> {
    ids.iter()
        .filter_map(|id| match registry.entries.get(*id) {
            Some(Slot::Live(entry)) => Some((*id, Arc::clone(entry))),
            _ => None,
        })
        .collect()
}

/// Snapshot for a class-wide trampoline.
pub(crate) fn snapshot_class(class: ClassId, selector: Selector) -> Option<Snapshot> {
    let registry = REGISTRY.read();
    let container = registry.containers.get(&(TargetKey::Class(class), selector))?;
    Some(Snapshot {
        before: collect(&registry, &container.before),
        instead: collect(&registry, &container.instead),
        after: collect(&registry, &container.after),
        original: container.original.clone(),
    })
}

/// Snapshot for a single-instance trampoline, merged with a class-wide
/// container anywhere on the receiver's chain.
///
/// Class-wide advice sits outermost: its before advice runs first, its
/// after advice last, and its instead advice yields to the instance's.
pub(crate) fn snapshot_instance(object: ObjectRef, selector: Selector) -> Option<Snapshot> {
    let class = store::class_of(object)?;
    let registry = REGISTRY.read();
    let instance = registry
        .containers
        .get(&(TargetKey::Instance(object), selector))?;
    let class_wide = chain_container(&registry, class, selector);

    let mut before = Vec::new();
    let mut instead = Vec::new();
    let mut after = Vec::new();

    if let Some(outer) = class_wide {
        before.extend(collect(&registry, &outer.before));
    }
    before.extend(collect(&registry, &instance.before));

    instead.extend(collect(&registry, &instance.instead));
    if let Some(outer) = class_wide {
        instead.extend(collect(&registry, &outer.instead));
    }

    after.extend(collect(&registry, &instance.after));
    if let Some(outer) = class_wide {
        after.extend(collect(&registry, &outer.after));
    }

    Some(Snapshot {
        before,
        instead,
        after,
        original: instance.original.clone(),
    })
}

/// Whether any aspect is installed on the object itself.
pub fn object_has_aspects(object: ObjectRef) -> bool {
    let registry = REGISTRY.read();
    registry
        .containers
        .keys()
        .any(|(target, _)| *target == TargetKey::Instance(object))
}

/// Whether any class-wide aspect is installed on the class itself.
pub fn class_has_aspects(class: ClassId) -> bool {
    let registry = REGISTRY.read();
    registry
        .containers
        .keys()
        .any(|(target, _)| *target == TargetKey::Class(class))
}

/// Number of registrations currently installed.
pub fn live_entry_count() -> usize {
    let registry = REGISTRY.read();
    registry
        .entries
        .values()
        .filter(|slot| matches!(slot, Slot::Live(_)))
        .count()
}

/// Builds the diagnostic report. See [`crate::report::registry_report`].
pub(crate) fn report_snapshot() -> RegistryReport {
    let registry = REGISTRY.read();
    let mut containers: Vec<ContainerReport> = registry
        .containers
        .iter()
        .map(|((target, selector), container)| {
            let (mode, label) = match target {
                TargetKey::Class(class) => ("class", class_label(*class)),
                TargetKey::Instance(object) => ("instance", object.to_string()),
            };
            ContainerReport {
                target: label,
                mode: mode.to_string(),
                selector: selector.to_string(),
                before: container.before.len(),
                instead: container.instead.len(),
                after: container.after.len(),
            }
        })
        .collect();
    containers.sort_by(|a, b| (&a.target, &a.selector).cmp(&(&b.target, &b.selector)));

    let mut live = 0usize;
    let mut orphaned = 0usize;
    for slot in registry.entries.values() {
        match slot {
            Slot::Live(_) => live += 1,
            Slot::Orphaned => orphaned += 1,
        }
    }
    RegistryReport {
        containers,
        live_entries: live,
        orphaned_entries: orphaned,
    }
}
