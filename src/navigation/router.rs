//! Navigation engine.
//!
//! # Responsibilities
//! - Subscribe to the history provider and keep only the latest location
//! - Process one location at a time: match, diff, guards, commit, notify
//! - Revert the history provider when a guard vetoes
//! - Keep speculative state equal to committed state between transitions
//!
//! # Design Decisions
//! - A single pending slot plus a running flag replaces a task queue;
//!   whatever is in the slot when the previous transition ends is next
//! - Every request bumps a generation counter; a transition whose
//!   generation is no longer current stops at its next guard
//! - After-hooks always run once committed; their failures are logged

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Instant;

use tokio::sync::{broadcast, Notify};
use tracing::Instrument;

use crate::config::schema::{RouterOptions, Schema};
use crate::config::validation::validate_config;
use crate::history::{History, Unlisten};
use crate::location::{strip_prefix, Location};
use crate::navigation::diff::{Arrival, Diff};
use crate::navigation::hooks::{HookKind, Transition};
use crate::navigation::{EngineState, NavigationError, Outcome};
use crate::observability::metrics;
use crate::routing::builder::RouteTree;
use crate::routing::error::RouteError;
use crate::routing::matcher::resolve;
use crate::routing::node::{NodeId, RouteNode};

/// Result of running the guards of one node.
enum Flow {
    Continue,
    Veto,
    Stale,
}

struct Engine {
    tree: RouteTree,
    history: Rc<dyn History>,
    options: RouterOptions,
    state: Cell<EngineState>,
    requested: Cell<u64>,
    pending: RefCell<Option<(u64, Location)>>,
    running: Cell<bool>,
    wake: Notify,
    committed: RefCell<Option<Location>>,
    last_outcome: RefCell<Option<Outcome>>,
    unlisten: RefCell<Option<Unlisten>>,
}

impl Engine {
    fn request(&self, location: Location) {
        let generation = self.requested.get() + 1;
        self.requested.set(generation);
        tracing::trace!(generation, location = %location, "Location requested");

        if let Some((superseded, _)) = self.pending.replace(Some((generation, location))) {
            tracing::debug!(superseded, "Pending location superseded");
        }
        self.wake.notify_one();
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.requested.get() != generation
    }

    fn is_listening(&self) -> bool {
        self.unlisten.borrow().is_some()
    }
}

/// Resets the running flag when a drain ends, even if its future is dropped.
struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Drives a route tree from a history provider. Cloning shares the engine.
#[derive(Clone)]
pub struct Router {
    engine: Rc<Engine>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("state", &self.engine.state.get())
            .field("location", &self.engine.committed.borrow())
            .field("routes", &self.engine.tree.nodes().len())
            .finish()
    }
}

impl Router {
    /// Builds the route tree. Nothing is matched until [`Router::listen`]
    /// or [`Router::navigate`] runs.
    pub fn new(
        schema: &Schema,
        history: impl History + 'static,
        options: RouterOptions,
    ) -> Result<Self, RouteError> {
        validate_config(&options.config).map_err(RouteError::InvalidOptions)?;
        let tree = RouteTree::build(schema, &options)?;

        tracing::info!(
            routes = tree.nodes().len(),
            prefix = options.config.prefix.as_deref().unwrap_or(""),
            "Router created"
        );

        Ok(Self {
            engine: Rc::new(Engine {
                tree,
                history: Rc::new(history),
                options,
                state: Cell::new(EngineState::Idle),
                requested: Cell::new(0),
                pending: RefCell::new(None),
                running: Cell::new(false),
                wake: Notify::new(),
                committed: RefCell::new(None),
                last_outcome: RefCell::new(None),
                unlisten: RefCell::new(None),
            }),
        })
    }

    pub fn tree(&self) -> &RouteTree {
        &self.engine.tree
    }

    /// Looks a route up by its dotted key.
    pub fn node(&self, key: &str) -> Option<RouteNode> {
        self.engine.tree.get(key).cloned()
    }

    pub fn history(&self) -> Rc<dyn History> {
        self.engine.history.clone()
    }

    pub fn state(&self) -> EngineState {
        self.engine.state.get()
    }

    /// Last committed location.
    pub fn location(&self) -> Option<Location> {
        self.engine.committed.borrow().clone()
    }

    /// How the most recently processed location ended.
    pub fn last_outcome(&self) -> Option<Outcome> {
        self.engine.last_outcome.borrow().clone()
    }

    /// Keys of committed routes in tree order.
    pub fn active(&self) -> Vec<String> {
        let sources = self.engine.tree.sources();
        let committed = sources.committed();
        let keys = committed
            .entries
            .keys()
            .filter_map(|id| self.engine.tree.node(*id))
            .map(|node| node.key().to_string())
            .collect();
        keys
    }

    pub fn is_listening(&self) -> bool {
        self.engine.is_listening()
    }

    /// Records `location` as the latest one to process.
    pub fn request(&self, location: impl Into<Location>) {
        self.engine.request(location.into());
    }

    /// Subscribes to the history provider and processes its current
    /// location. Subscription happens after one yield so routes and hooks
    /// wired right after construction see the first transition.
    pub async fn listen(&self) {
        if self.is_listening() {
            return;
        }
        tokio::task::yield_now().await;
        if self.is_listening() {
            return;
        }

        let weak: Weak<Engine> = Rc::downgrade(&self.engine);
        let unlisten = self.engine.history.listen(Rc::new(move |location: &Location| {
            if let Some(engine) = weak.upgrade() {
                engine.request(location.clone());
            }
        }));
        *self.engine.unlisten.borrow_mut() = Some(unlisten);
        tracing::debug!("Subscribed to history");

        self.engine.request(self.engine.history.location());
        self.drain().await;
    }

    /// Pushes `location` onto the history and processes it.
    pub async fn navigate(&self, location: impl Into<Location>) {
        self.follow(location.into(), false);
        self.drain().await;
    }

    /// Replaces the current history entry with `location` and processes it.
    pub async fn replace(&self, location: impl Into<Location>) {
        self.follow(location.into(), true);
        self.drain().await;
    }

    /// Listens and processes history events until `shutdown` fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        self.listen().await;

        loop {
            tokio::select! {
                _ = self.engine.wake.notified() => {
                    self.drain().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Router received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        self.teardown();
    }

    /// Unsubscribes from the history provider.
    pub fn teardown(&self) {
        if let Some(unlisten) = self.engine.unlisten.borrow_mut().take() {
            unlisten.call();
            tracing::debug!("Unsubscribed from history");
        }
    }

    /// Processes pending locations until the slot is empty. Returns at once
    /// when another drain is already running; that one picks up whatever
    /// was requested.
    pub async fn drain(&self) {
        let engine = &self.engine;
        if engine.running.replace(true) {
            return;
        }
        let _running = RunningGuard(&engine.running);

        loop {
            let next = engine.pending.borrow_mut().take();
            let Some((generation, location)) = next else {
                break;
            };

            let span = tracing::debug_span!("transition", generation, location = %location);
            let start = Instant::now();
            let outcome = match self.process(generation, location).instrument(span).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::error!(%error, "Transition abandoned");
                    Outcome::Abandoned {
                        reason: error.to_string(),
                    }
                }
            };
            metrics::record_transition_duration(start);
            metrics::record_transition(outcome.as_str());

            if outcome != Outcome::Committed {
                self.restore_speculative();
            }
            tracing::debug!(outcome = %outcome, "Transition finished");
            *engine.last_outcome.borrow_mut() = Some(outcome);
            engine.state.set(EngineState::Idle);
        }
    }

    async fn process(&self, generation: u64, location: Location) -> Result<Outcome, NavigationError> {
        let engine = &self.engine;
        let sources = engine.tree.sources().clone();
        engine.state.set(EngineState::Matching);

        let prefix = engine.options.config.prefix.as_deref();
        let Some(pathname) = strip_prefix(&location.pathname, prefix) else {
            tracing::warn!(pathname = %location.pathname, "Location outside prefix");
            if let Some(on_leave) = &engine.options.on_leave {
                on_leave(&location.pathname);
            }
            return Ok(Outcome::OutOfPrefix);
        };

        if engine.committed.borrow().as_ref() == Some(&location) {
            return Ok(Outcome::Unchanged);
        }

        let next = resolve(&engine.tree, pathname, location.query())?;
        sources.publish(next);
        self.apply_speculative();

        let diff = Diff::compute(&engine.tree, &sources.committed(), &sources.speculative());
        tracing::debug!(
            leaving = diff.leaving.len(),
            arriving = diff.arriving.len(),
            "Diff computed"
        );

        let from = engine.committed.borrow().clone();
        engine.state.set(EngineState::AwaitingBeforeHooks);

        for id in diff.leaving.iter().rev() {
            let Some(node) = self.node_at(*id) else { continue };
            let flow = self
                .run_guards(generation, &node, HookKind::BeforeLeave, &from, &location)
                .await?;
            if let Some(outcome) = self.settle(flow, &node, HookKind::BeforeLeave) {
                return Ok(outcome);
            }
        }

        for (id, arrival) in &diff.arriving {
            let Some(node) = self.node_at(*id) else { continue };
            let kind = match arrival {
                Arrival::Entering => HookKind::BeforeEnter,
                Arrival::Updating => HookKind::BeforeUpdate,
            };
            let flow = self.run_guards(generation, &node, kind, &from, &location).await?;
            if let Some(outcome) = self.settle(flow, &node, kind) {
                return Ok(outcome);
            }
        }

        if engine.is_stale(generation) {
            return Ok(Outcome::Superseded);
        }

        self.commit(&diff, &location);

        for id in diff.leaving.iter().rev() {
            let Some(node) = self.node_at(*id) else { continue };
            self.run_after(&node, HookKind::AfterLeave, &from, &location).await;
        }
        for (id, arrival) in &diff.arriving {
            let Some(node) = self.node_at(*id) else { continue };
            let kind = match arrival {
                Arrival::Entering => HookKind::AfterEnter,
                Arrival::Updating => HookKind::AfterUpdate,
            };
            self.run_after(&node, kind, &from, &location).await;
        }

        if let Some(on_change) = &engine.options.on_change {
            on_change(from.as_ref(), &location);
        }
        Ok(Outcome::Committed)
    }

    fn commit(&self, diff: &Diff, location: &Location) {
        let engine = &self.engine;
        let sources = engine.tree.sources();
        sources.commit();
        *engine.committed.borrow_mut() = Some(location.clone());
        engine.state.set(EngineState::Committed);

        let committed = sources.committed();
        let touched = diff
            .leaving
            .iter()
            .rev()
            .chain(diff.arriving.iter().map(|(id, _)| id));
        for id in touched {
            if let Some(node) = engine.tree.node(*id) {
                node.state().apply(node, &committed);
            }
        }
        for node in engine.tree.nodes() {
            if committed.is_matched(node.id()) && !diff.is_touched(node.id()) {
                node.state().refresh_query(node, &committed);
            }
        }

        tracing::info!(location = %location, routes = committed.entries.len(), "Transition committed");
    }

    async fn run_guards(
        &self,
        generation: u64,
        node: &RouteNode,
        kind: HookKind,
        from: &Option<Location>,
        to: &Location,
    ) -> Result<Flow, NavigationError> {
        let mut pending = node.hooks().pending(kind);
        while let Some(hook) = pending.next_hook() {
            let transition = Transition {
                node: node.clone(),
                from: from.clone(),
                to: to.clone(),
            };
            let allowed = hook(transition).await.map_err(|source| NavigationError::Hook {
                route: node.key().to_string(),
                kind,
                source,
            })?;
            metrics::record_hook(kind, allowed);

            if self.engine.is_stale(generation) {
                tracing::debug!(route = node.key(), "Superseded by a newer location");
                return Ok(Flow::Stale);
            }
            if !allowed {
                return Ok(Flow::Veto);
            }
        }
        Ok(Flow::Continue)
    }

    async fn run_after(&self, node: &RouteNode, kind: HookKind, from: &Option<Location>, to: &Location) {
        let mut pending = node.hooks().pending(kind);
        while let Some(hook) = pending.next_hook() {
            let transition = Transition {
                node: node.clone(),
                from: from.clone(),
                to: to.clone(),
            };
            match hook(transition).await {
                Ok(_) => metrics::record_hook(kind, true),
                Err(error) => {
                    tracing::warn!(route = node.key(), kind = %kind, %error, "After-hook failed");
                }
            }
        }
    }

    fn settle(&self, flow: Flow, node: &RouteNode, kind: HookKind) -> Option<Outcome> {
        match flow {
            Flow::Continue => None,
            Flow::Stale => Some(Outcome::Superseded),
            Flow::Veto => {
                tracing::warn!(route = node.key(), kind = %kind, "Transition vetoed");
                self.revert();
                Some(Outcome::Vetoed {
                    route: node.key().to_string(),
                    kind,
                })
            }
        }
    }

    /// Points the history back at the committed location, or the default
    /// one when nothing was committed yet.
    fn revert(&self) {
        let engine = &self.engine;
        let target = engine.committed.borrow().clone().or_else(|| {
            engine
                .options
                .config
                .default
                .as_deref()
                .map(Location::parse)
        });
        match target {
            Some(target) => {
                tracing::info!(location = %target, "Reverting history");
                self.follow(target, true);
            }
            None => tracing::warn!("Nothing committed and no default location, history left as is"),
        }
    }

    fn follow(&self, location: Location, replace: bool) {
        let listening = self.is_listening();
        if replace {
            self.engine.history.replace(location.clone());
        } else {
            self.engine.history.push(location.clone());
        }
        if !listening {
            self.engine.request(location);
        }
    }

    fn restore_speculative(&self) {
        self.engine.tree.sources().revert();
        self.apply_speculative();
    }

    fn apply_speculative(&self) {
        let speculative = self.engine.tree.sources().speculative();
        for node in self.engine.tree.nodes() {
            node.next().apply(node, &speculative);
        }
    }

    fn node_at(&self, id: NodeId) -> Option<RouteNode> {
        self.engine.tree.node(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteDecl;
    use crate::history::MemoryHistory;

    fn schema() -> Schema {
        Schema::new()
            .route("home", RouteDecl::new().matching(""))
            .route("about", RouteDecl::new())
            .route(
                "users",
                RouteDecl::new().children(Schema::new().route("user", RouteDecl::new().matching("*"))),
            )
    }

    fn router(history: &MemoryHistory) -> Router {
        Router::new(&schema(), history.clone(), RouterOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_listen_primes_with_current_location() {
        let history = MemoryHistory::new("/about");
        let router = router(&history);
        assert!(router.location().is_none());

        router.listen().await;
        assert!(router.is_listening());
        assert_eq!(router.active(), vec!["about"]);
        assert_eq!(router.location(), Some(Location::parse("/about")));
        assert_eq!(router.state(), EngineState::Idle);
        assert_eq!(history.listener_count(), 1);

        router.teardown();
        assert_eq!(history.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_navigate_without_listening() {
        let history = MemoryHistory::default();
        let router = router(&history);

        router.navigate("/users/7").await;
        assert_eq!(router.active(), vec!["users", "users.user"]);
        assert_eq!(router.node("users.user").unwrap().segments().get("user").map(String::as_str), Some("7"));
        assert_eq!(history.location(), Location::parse("/users/7"));
        assert_eq!(router.last_outcome(), Some(Outcome::Committed));
    }

    #[tokio::test]
    async fn test_same_location_is_unchanged() {
        let history = MemoryHistory::default();
        let router = router(&history);
        router.navigate("/about").await;
        router.navigate("/about").await;
        assert_eq!(router.last_outcome(), Some(Outcome::Unchanged));
    }

    #[tokio::test]
    async fn test_veto_reverts_history() {
        let history = MemoryHistory::default();
        let router = router(&history);
        router.listen().await;
        router.navigate("/about").await;

        let _guard = router.node("users").unwrap().before_enter(|_| async { false });
        router.navigate("/users/1").await;

        assert_eq!(router.active(), vec!["about"]);
        assert_eq!(history.location(), Location::parse("/about"));
        assert!(!router.node("users").unwrap().next().matched());
    }

    #[tokio::test]
    async fn test_hook_error_abandons_transition() {
        let history = MemoryHistory::default();
        let router = router(&history);
        router.navigate("/about").await;

        let _guard = router
            .node("home")
            .unwrap()
            .before_enter(|_| async { Err::<bool, _>(std::io::Error::other("boom")) });
        router.navigate("/").await;

        assert!(matches!(router.last_outcome(), Some(Outcome::Abandoned { .. })));
        assert_eq!(router.active(), vec!["about"]);

        router.navigate("/users/2").await;
        assert_eq!(router.last_outcome(), Some(Outcome::Committed));
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let options = RouterOptions::default().prefix("app");
        let err = Router::new(&schema(), MemoryHistory::default(), options).unwrap_err();
        assert!(matches!(err, RouteError::InvalidOptions(_)));
    }
}
