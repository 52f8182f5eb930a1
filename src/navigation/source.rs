//! Route source snapshots.
//!
//! # Responsibilities
//! - Hold the committed snapshot and the speculative (next) snapshot
//! - Replace snapshots wholesale: publish, commit, revert
//! - Derive per-node segments and query from a snapshot
//!
//! # Design Decisions
//! - Snapshots are plain values; nodes read them, only the engine writes
//! - Outside a transaction both snapshots are equal

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;

use crate::location::{normalize_prefix, Query};
use crate::routing::matcher::MatchEntry;
use crate::routing::node::{NodeId, RouteNode};

/// One authoritative view of which routes are matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteSource {
    /// Matched nodes in tree order.
    pub entries: BTreeMap<NodeId, MatchEntry>,
    /// Query with group paths stripped.
    pub query: Query,
    /// Raw path per group slot; `None` is the primary path.
    pub paths: BTreeMap<Option<String>, String>,
}

impl RouteSource {
    pub fn is_matched(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn entry(&self, id: NodeId) -> Option<&MatchEntry> {
        self.entries.get(&id)
    }

    /// Segments captured by `node` and its ancestors, keyed by route name.
    pub fn segments_for(&self, node: &RouteNode) -> BTreeMap<String, String> {
        let mut segments = BTreeMap::new();
        if !self.is_matched(node.id()) {
            return segments;
        }
        for ancestor in node.lineage() {
            if let Some(entry) = self.entries.get(&ancestor.id()) {
                segments.insert(ancestor.name().to_string(), entry.segment.clone());
            }
        }
        segments
    }

    /// Declared query keys of `node`, each with its current value.
    pub fn query_for(&self, node: &RouteNode) -> BTreeMap<String, Option<String>> {
        if !self.is_matched(node.id()) {
            return BTreeMap::new();
        }
        node.query_keys()
            .iter()
            .map(|key| (key.clone(), self.query.get(key).map(str::to_string)))
            .collect()
    }
}

/// The engine's committed and speculative snapshots.
#[derive(Debug, Default)]
pub struct RouteSources {
    committed: RefCell<RouteSource>,
    speculative: RefCell<RouteSource>,
    prefix: Option<String>,
}

impl RouteSources {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: normalize_prefix(prefix.as_deref()).map(str::to_string),
            ..Self::default()
        }
    }

    pub fn committed(&self) -> Ref<'_, RouteSource> {
        self.committed.borrow()
    }

    pub fn speculative(&self) -> Ref<'_, RouteSource> {
        self.speculative.borrow()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub(crate) fn publish(&self, next: RouteSource) {
        *self.speculative.borrow_mut() = next;
    }

    pub(crate) fn commit(&self) {
        let next = self.speculative.borrow().clone();
        *self.committed.borrow_mut() = next;
    }

    pub(crate) fn revert(&self) {
        let current = self.committed.borrow().clone();
        *self.speculative.borrow_mut() = current;
    }
}
