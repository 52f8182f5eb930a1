//! Route nodes.
//!
//! # Responsibilities
//! - Own a compiled pattern, declared query keys and children
//! - Expose committed state (what the UI observes) and speculative state
//!   (what a transition is about to make true)
//! - Accept lifecycle hook registrations
//! - Rebuild a location for the route
//!
//! # Design Decisions
//! - One node carries both state records; topology is never duplicated
//! - Parent links are weak, children are owned
//! - State observables are written only by the navigation engine

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};

use crate::location::{Location, Query};
use crate::navigation::hooks::{HookKind, HookOutput, HookRegistration, HookRegistry, Transition};
use crate::navigation::source::{RouteSource, RouteSources};
use crate::observable::Observable;
use crate::routing::error::RouteError;
use crate::routing::pattern::Pattern;

/// Pre-order index of a node in its tree.
pub type NodeId = usize;

/// Restricts which group routes may be active next to a primary match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parallel {
    pub groups: BTreeSet<String>,
    pub matches: BTreeSet<NodeId>,
}

impl Parallel {
    pub fn allows(&self, group: &str, leaf: NodeId) -> bool {
        self.groups.contains(group) || self.matches.contains(&leaf)
    }
}

/// Observable match state of a node.
#[derive(Debug, Default)]
pub struct NodeState {
    pub matched: Observable<bool>,
    pub exact: Observable<bool>,
    pub segments: Observable<BTreeMap<String, String>>,
    pub query: Observable<BTreeMap<String, Option<String>>>,
}

impl NodeState {
    pub fn matched(&self) -> bool {
        self.matched.get()
    }

    pub fn exact(&self) -> bool {
        self.exact.get()
    }

    pub fn segments(&self) -> BTreeMap<String, String> {
        self.segments.get()
    }

    /// Mirrors `source` into the observables; returns whether any changed.
    pub(crate) fn apply(&self, node: &RouteNode, source: &RouteSource) -> bool {
        let entry = source.entry(node.id());
        let matched = self.matched.set(entry.is_some());
        let exact = self.exact.set(entry.is_some_and(|e| e.exact));
        let segments = self.segments.set(source.segments_for(node));
        let query = self.refresh_query(node, source);
        matched || exact || segments || query
    }

    pub(crate) fn refresh_query(&self, node: &RouteNode, source: &RouteSource) -> bool {
        self.query.set(source.query_for(node))
    }
}

pub(crate) struct NodeInner {
    pub(crate) id: NodeId,
    pub(crate) key: String,
    pub(crate) name: String,
    pub(crate) pattern: Pattern,
    pub(crate) query_keys: Vec<String>,
    pub(crate) exact: bool,
    pub(crate) group: Option<String>,
    pub(crate) extension: Map<String, Value>,
    pub(crate) parent: Weak<NodeInner>,
    pub(crate) children: OnceCell<Vec<RouteNode>>,
    pub(crate) parallel: OnceCell<Parallel>,
    pub(crate) committed: NodeState,
    pub(crate) speculative: NodeState,
    pub(crate) hooks: HookRegistry,
    pub(crate) sources: Rc<RouteSources>,
}

/// Handle to one compiled route. Cloning is cheap and shares the node.
#[derive(Clone)]
pub struct RouteNode {
    pub(crate) inner: Rc<NodeInner>,
}

impl fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteNode")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .field("pattern", &self.inner.pattern)
            .field("matched", &self.matched())
            .field("exact", &self.exact())
            .finish()
    }
}

impl PartialEq for RouteNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for RouteNode {}

impl RouteNode {
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Dotted path of names from the root, e.g. `users.user`.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn pattern(&self) -> &Pattern {
        &self.inner.pattern
    }

    pub fn query_keys(&self) -> &[String] {
        &self.inner.query_keys
    }

    /// Whether the route was declared `$exact`.
    pub fn is_exact_route(&self) -> bool {
        self.inner.exact
    }

    pub fn group(&self) -> Option<&str> {
        self.inner.group.as_deref()
    }

    pub fn extension(&self) -> &Map<String, Value> {
        &self.inner.extension
    }

    pub fn parallel(&self) -> Option<&Parallel> {
        self.inner.parallel.get()
    }

    pub fn parent(&self) -> Option<RouteNode> {
        self.inner.parent.upgrade().map(|inner| RouteNode { inner })
    }

    pub fn children(&self) -> &[RouteNode] {
        self.inner.children.get().map_or(&[], Vec::as_slice)
    }

    pub fn child(&self, name: &str) -> Option<&RouteNode> {
        self.children().iter().find(|c| c.name() == name)
    }

    /// Ancestors from the root down to and including this node.
    pub fn lineage(&self) -> Vec<RouteNode> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            chain.push(node);
        }
        chain.reverse();
        chain
    }

    /// Committed state, the one observers render from.
    pub fn state(&self) -> &NodeState {
        &self.inner.committed
    }

    /// Speculative state of the transition in flight.
    pub fn next(&self) -> &NodeState {
        &self.inner.speculative
    }

    pub fn matched(&self) -> bool {
        self.inner.committed.matched()
    }

    pub fn exact(&self) -> bool {
        self.inner.committed.exact()
    }

    pub fn segments(&self) -> BTreeMap<String, String> {
        self.inner.committed.segments()
    }

    /// Declared query values; empty while the route is not matched.
    pub fn query(&self) -> Result<BTreeMap<String, Option<String>>, RouteError> {
        if self.inner.query_keys.is_empty() {
            return Err(RouteError::NoQueryKeys {
                route: self.inner.key.clone(),
            });
        }
        Ok(self.inner.committed.query.get())
    }

    pub fn query_param(&self, key: &str) -> Result<Option<String>, RouteError> {
        if !self.inner.query_keys.iter().any(|k| k == key) {
            return Err(RouteError::UndeclaredQueryKey {
                route: self.inner.key.clone(),
                key: key.to_string(),
            });
        }
        Ok(self
            .inner
            .committed
            .query
            .with(|query| query.get(key).cloned().flatten()))
    }

    /// Builds a location for this route.
    ///
    /// `params` overrides captured segments by route name. With
    /// `preserve_query` the committed query and group paths are kept.
    pub fn path<'a, I>(&self, params: I, preserve_query: bool) -> Result<String, RouteError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let params: BTreeMap<&str, &str> = params.into_iter().collect();
        let captured = self.segments();

        let mut parts = Vec::new();
        for node in self.lineage() {
            let segment = match params.get(node.name()) {
                Some(value) => value.to_string(),
                None => match (node.pattern().literal(), captured.get(node.name())) {
                    (Some(literal), _) => literal.to_string(),
                    (None, Some(value)) => value.clone(),
                    (None, None) => {
                        return Err(RouteError::MissingSegment {
                            route: self.inner.key.clone(),
                            segment: node.name().to_string(),
                        })
                    }
                },
            };
            if !segment.is_empty() {
                parts.push(segment);
            }
        }
        let own_path = format!("/{}", parts.join("/"));

        let sources = &self.inner.sources;
        let committed = sources.committed();
        let mut query = if preserve_query {
            committed.query.clone()
        } else {
            Query::default()
        };
        if preserve_query {
            for (slot, path) in &committed.paths {
                if let Some(group) = slot {
                    query.insert(format!("_{}", group), path.clone());
                }
            }
        }

        let pathname = match self.group() {
            None => own_path,
            Some(group) => {
                query.insert(format!("_{}", group), own_path);
                committed
                    .paths
                    .get(&None)
                    .cloned()
                    .unwrap_or_else(|| "/".to_string())
            }
        };
        let pathname = format!("{}{}", sources.prefix().unwrap_or(""), pathname);

        Ok(Location::new(pathname, query.to_search()).to_string())
    }

    pub fn before_enter<F, Fut>(&self, hook: F) -> HookRegistration
    where
        F: Fn(Transition) -> Fut + 'static,
        Fut: Future + 'static,
        Fut::Output: HookOutput,
    {
        self.inner.hooks.register(HookKind::BeforeEnter, hook)
    }

    pub fn after_enter<F, Fut>(&self, hook: F) -> HookRegistration
    where
        F: Fn(Transition) -> Fut + 'static,
        Fut: Future + 'static,
        Fut::Output: HookOutput,
    {
        self.inner.hooks.register(HookKind::AfterEnter, hook)
    }

    pub fn before_leave<F, Fut>(&self, hook: F) -> HookRegistration
    where
        F: Fn(Transition) -> Fut + 'static,
        Fut: Future + 'static,
        Fut::Output: HookOutput,
    {
        self.inner.hooks.register(HookKind::BeforeLeave, hook)
    }

    pub fn after_leave<F, Fut>(&self, hook: F) -> HookRegistration
    where
        F: Fn(Transition) -> Fut + 'static,
        Fut: Future + 'static,
        Fut::Output: HookOutput,
    {
        self.inner.hooks.register(HookKind::AfterLeave, hook)
    }

    pub fn before_update<F, Fut>(&self, hook: F) -> HookRegistration
    where
        F: Fn(Transition) -> Fut + 'static,
        Fut: Future + 'static,
        Fut::Output: HookOutput,
    {
        self.inner.hooks.register(HookKind::BeforeUpdate, hook)
    }

    pub fn after_update<F, Fut>(&self, hook: F) -> HookRegistration
    where
        F: Fn(Transition) -> Fut + 'static,
        Fut: Future + 'static,
        Fut::Output: HookOutput,
    {
        self.inner.hooks.register(HookKind::AfterUpdate, hook)
    }

    pub(crate) fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }
}
