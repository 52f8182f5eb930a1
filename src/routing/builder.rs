//! Route tree compilation.
//!
//! # Responsibilities
//! - Walk the schema recursively and instantiate one node per entry
//! - Derive match literals from route names when `$match` is omitted
//! - Inherit groups from the nearest ancestor and collect group names
//! - Index every node by pre-order id and dotted key
//!
//! # Design Decisions
//! - Building is synchronous and fails only on pattern or wiring errors
//! - `$parallel.matches` are resolved after the whole tree exists, so
//!   they may reference routes declared later

use std::cell::OnceCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::{Rc, Weak};

use crate::config::schema::{ParallelDecl, RouterOptions, Schema};
use crate::navigation::hooks::HookRegistry;
use crate::navigation::source::RouteSources;
use crate::routing::error::RouteError;
use crate::routing::node::{NodeId, NodeInner, NodeState, Parallel, RouteNode};
use crate::routing::pattern::Pattern;

/// The compiled route tree plus its lookup tables.
#[derive(Debug)]
pub struct RouteTree {
    roots: Vec<RouteNode>,
    nodes: Vec<RouteNode>,
    by_key: HashMap<String, NodeId>,
    groups: BTreeSet<String>,
    sources: Rc<RouteSources>,
}

struct BuildContext<'a> {
    options: &'a RouterOptions,
    sources: Rc<RouteSources>,
    nodes: Vec<RouteNode>,
    parallels: Vec<(NodeId, ParallelDecl)>,
}

impl RouteTree {
    pub fn build(schema: &Schema, options: &RouterOptions) -> Result<Self, RouteError> {
        let sources = Rc::new(RouteSources::new(options.config.prefix.clone()));
        let mut ctx = BuildContext {
            options,
            sources: sources.clone(),
            nodes: Vec::new(),
            parallels: Vec::new(),
        };
        let mut groups = BTreeSet::new();
        let roots = build_nodes(schema, None, &mut groups, &mut ctx)?;

        let by_key: HashMap<String, NodeId> = ctx
            .nodes
            .iter()
            .map(|node| (node.key().to_string(), node.id()))
            .collect();

        for (id, decl) in ctx.parallels {
            let node = &ctx.nodes[id];
            let mut matches = BTreeSet::new();
            for target in &decl.matches {
                let Some(target_id) = by_key.get(target) else {
                    return Err(RouteError::UnknownParallelMatch {
                        route: node.key().to_string(),
                        target: target.clone(),
                    });
                };
                matches.insert(*target_id);
            }
            let parallel = Parallel {
                groups: decl.groups.iter().cloned().collect(),
                matches,
            };
            let stored = node.inner.parallel.set(parallel);
            debug_assert!(stored.is_ok(), "`$parallel` resolved twice for `{}`", node.key());
        }

        tracing::debug!(
            routes = ctx.nodes.len(),
            groups = groups.len(),
            "Route tree compiled"
        );

        Ok(Self {
            roots,
            nodes: ctx.nodes,
            by_key,
            groups,
            sources,
        })
    }

    /// Top-level routes in declaration order.
    pub fn roots(&self) -> &[RouteNode] {
        &self.roots
    }

    /// Every route in tree (pre-)order.
    pub fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&RouteNode> {
        self.nodes.get(id)
    }

    /// Looks a route up by its dotted key.
    pub fn get(&self, key: &str) -> Option<&RouteNode> {
        self.by_key.get(key).and_then(|id| self.nodes.get(*id))
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn sources(&self) -> &Rc<RouteSources> {
        &self.sources
    }
}

/// Instantiates the routes of one schema level under `parent`, recursing
/// into children. Every group name met is added to `groups`.
fn build_nodes(
    schema: &Schema,
    parent: Option<&RouteNode>,
    groups: &mut BTreeSet<String>,
    ctx: &mut BuildContext<'_>,
) -> Result<Vec<RouteNode>, RouteError> {
    let mut level = Vec::with_capacity(schema.len());

    for (name, decl) in schema.entries() {
        let key = match parent {
            Some(parent) => format!("{}.{}", parent.key(), name),
            None => name.clone(),
        };
        let pattern = Pattern::compile(&key, decl.matcher.as_ref(), || {
            (ctx.options.segment_matcher)(name)
        })?;

        let group = decl
            .group
            .clone()
            .or_else(|| parent.and_then(|p| p.group().map(str::to_string)));
        if let Some(group) = &group {
            groups.insert(group.clone());
        }

        let id = ctx.nodes.len();
        let node = RouteNode {
            inner: Rc::new(NodeInner {
                id,
                key,
                name: name.clone(),
                pattern,
                query_keys: decl.query.clone(),
                exact: decl.exact,
                group,
                extension: decl.extension.clone(),
                parent: parent.map_or_else(Weak::new, |p| Rc::downgrade(&p.inner)),
                children: OnceCell::new(),
                parallel: OnceCell::new(),
                committed: NodeState::default(),
                speculative: NodeState::default(),
                hooks: HookRegistry::default(),
                sources: ctx.sources.clone(),
            }),
        };
        ctx.nodes.push(node.clone());
        if let Some(parallel) = &decl.parallel {
            ctx.parallels.push((id, parallel.clone()));
        }

        let children = match &decl.children {
            Some(children) => build_nodes(children, Some(&node), groups, ctx)?,
            None => Vec::new(),
        };
        let stored = node.inner.children.set(children);
        debug_assert!(stored.is_ok(), "children of `{}` built twice", node.key());

        level.push(node);
    }

    Ok(level)
}
