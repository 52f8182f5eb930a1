//! Per-route lifecycle hooks.
//!
//! # Responsibilities
//! - Keep ordered hook lists per kind
//! - Hand out registrations that remove their hook
//! - Yield the hooks of a kind one at a time while a transition runs
//!
//! # Design Decisions
//! - Registration order is firing order
//! - A hook removed while its kind is firing is skipped if not yet reached
//! - No registered guard is an implicit "allow"

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures_util::future::{FutureExt, LocalBoxFuture};

use crate::location::Location;
use crate::routing::node::RouteNode;

/// Error type hooks may fail with.
pub type BoxError = Box<dyn std::error::Error>;

/// Lifecycle points a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    BeforeEnter,
    BeforeUpdate,
    BeforeLeave,
    AfterEnter,
    AfterUpdate,
    AfterLeave,
}

impl HookKind {
    /// Guards can veto a transition; after-hooks cannot.
    pub fn is_guard(self) -> bool {
        matches!(
            self,
            HookKind::BeforeEnter | HookKind::BeforeUpdate | HookKind::BeforeLeave
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::BeforeEnter => "before_enter",
            HookKind::BeforeUpdate => "before_update",
            HookKind::BeforeLeave => "before_leave",
            HookKind::AfterEnter => "after_enter",
            HookKind::AfterUpdate => "after_update",
            HookKind::AfterLeave => "after_leave",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook sees when it fires.
#[derive(Debug, Clone)]
pub struct Transition {
    /// The route the hook is registered on.
    pub node: RouteNode,
    /// Last committed location, `None` before the first commit.
    pub from: Option<Location>,
    /// Location being navigated to.
    pub to: Location,
}

/// Values a hook may resolve to.
///
/// `false` from a guard vetoes the transition; an error abandons it.
pub trait HookOutput {
    fn into_verdict(self) -> Result<bool, BoxError>;
}

impl HookOutput for () {
    fn into_verdict(self) -> Result<bool, BoxError> {
        Ok(true)
    }
}

impl HookOutput for bool {
    fn into_verdict(self) -> Result<bool, BoxError> {
        Ok(self)
    }
}

impl<E: Into<BoxError>> HookOutput for Result<bool, E> {
    fn into_verdict(self) -> Result<bool, BoxError> {
        self.map_err(Into::into)
    }
}

impl<E: Into<BoxError>> HookOutput for Result<(), E> {
    fn into_verdict(self) -> Result<bool, BoxError> {
        self.map(|()| true).map_err(Into::into)
    }
}

pub(crate) type HookFn = Rc<dyn Fn(Transition) -> LocalBoxFuture<'static, Result<bool, BoxError>>>;

type Slots = RefCell<BTreeMap<HookKind, Vec<(u64, HookFn)>>>;

/// Ordered hook lists of one route.
#[derive(Default)]
pub struct HookRegistry {
    slots: Rc<Slots>,
    next_token: Cell<u64>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<HookKind, usize> = self
            .slots
            .borrow()
            .iter()
            .map(|(kind, hooks)| (*kind, hooks.len()))
            .collect();
        f.debug_struct("HookRegistry").field("hooks", &counts).finish()
    }
}

impl HookRegistry {
    pub fn register<F, Fut>(&self, kind: HookKind, hook: F) -> HookRegistration
    where
        F: Fn(Transition) -> Fut + 'static,
        Fut: Future + 'static,
        Fut::Output: HookOutput,
    {
        let token = self.next_token.get();
        self.next_token.set(token + 1);

        let hook: HookFn = Rc::new(move |transition: Transition| {
            hook(transition).map(HookOutput::into_verdict).boxed_local()
        });
        self.slots
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push((token, hook));

        HookRegistration {
            slots: Rc::downgrade(&self.slots),
            kind,
            token,
        }
    }

    pub fn len(&self, kind: HookKind) -> usize {
        self.slots.borrow().get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, kind: HookKind) -> bool {
        self.len(kind) == 0
    }

    /// Snapshot of the hooks registered for `kind`, resolved lazily.
    pub(crate) fn pending(&self, kind: HookKind) -> PendingHooks {
        let tokens = self
            .slots
            .borrow()
            .get(&kind)
            .map(|hooks| hooks.iter().map(|(token, _)| *token).collect())
            .unwrap_or_default();
        PendingHooks {
            slots: self.slots.clone(),
            kind,
            tokens,
        }
    }
}

/// Hooks due to fire for one kind, in registration order.
pub(crate) struct PendingHooks {
    slots: Rc<Slots>,
    kind: HookKind,
    tokens: VecDeque<u64>,
}

impl PendingHooks {
    /// Next hook still registered; removed hooks are skipped.
    pub(crate) fn next_hook(&mut self) -> Option<HookFn> {
        while let Some(token) = self.tokens.pop_front() {
            let slots = self.slots.borrow();
            let found = slots
                .get(&self.kind)
                .and_then(|hooks| hooks.iter().find(|(t, _)| *t == token))
                .map(|(_, hook)| hook.clone());
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

/// Handle returned by hook registration.
///
/// Dropping it keeps the hook; call [`HookRegistration::remove`] to
/// deregister.
#[derive(Debug)]
pub struct HookRegistration {
    slots: Weak<Slots>,
    kind: HookKind,
    token: u64,
}

impl HookRegistration {
    pub fn kind(&self) -> HookKind {
        self.kind
    }

    /// Deregisters the hook. Harmless if it already fired.
    pub fn remove(self) {
        if let Some(slots) = self.slots.upgrade() {
            if let Some(hooks) = slots.borrow_mut().get_mut(&self.kind) {
                hooks.retain(|(token, _)| *token != self.token);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_in_registration_order() {
        let registry = HookRegistry::default();
        let _a = registry.register(HookKind::BeforeEnter, |_| async { true });
        let _b = registry.register(HookKind::BeforeEnter, |_| async { false });
        let _c = registry.register(HookKind::AfterEnter, |_| async {});

        assert_eq!(registry.len(HookKind::BeforeEnter), 2);
        assert_eq!(registry.len(HookKind::AfterEnter), 1);
        assert!(registry.is_empty(HookKind::BeforeLeave));

        let mut pending = registry.pending(HookKind::BeforeEnter);
        assert!(pending.next_hook().is_some());
        assert!(pending.next_hook().is_some());
        assert!(pending.next_hook().is_none());
    }

    #[test]
    fn test_removed_hook_is_skipped_mid_firing() {
        let registry = HookRegistry::default();
        let _first = registry.register(HookKind::BeforeLeave, |_| async { true });
        let second = registry.register(HookKind::BeforeLeave, |_| async { true });

        let mut pending = registry.pending(HookKind::BeforeLeave);
        assert!(pending.next_hook().is_some());
        second.remove();
        assert!(pending.next_hook().is_none());
        assert_eq!(registry.len(HookKind::BeforeLeave), 1);
    }

    #[test]
    fn test_remove_after_registry_dropped_is_noop() {
        let registry = HookRegistry::default();
        let registration = registry.register(HookKind::AfterLeave, |_| async {});
        drop(registry);
        registration.remove();
    }

    #[test]
    fn test_hook_outputs() {
        assert!(().into_verdict().unwrap());
        assert!(!false.into_verdict().unwrap());
        let failed: Result<bool, BoxError> = Err("nope".into());
        assert!(failed.into_verdict().is_err());
        let ok: Result<(), std::io::Error> = Ok(());
        assert!(ok.into_verdict().unwrap());
    }

    #[test]
    fn test_guard_kinds() {
        assert!(HookKind::BeforeUpdate.is_guard());
        assert!(!HookKind::AfterUpdate.is_guard());
        assert_eq!(HookKind::BeforeLeave.to_string(), "before_leave");
    }
}
