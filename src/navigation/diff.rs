//! Transition diff sets.
//!
//! # Responsibilities
//! - Split committed vs. next snapshots into leaving, entering and
//!   updating routes
//!
//! # Design Decisions
//! - Sets are in tree order; callers reverse them where needed
//! - A route in both snapshots with unchanged segments (its own and its
//!   ancestors') and exactness is untouched

use crate::navigation::source::RouteSource;
use crate::routing::builder::RouteTree;
use crate::routing::node::NodeId;

/// How a route takes part in the next state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    Entering,
    Updating,
}

/// Routes touched by a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Matched now, not matched next.
    pub leaving: Vec<NodeId>,
    /// Entering or updating routes, in tree order.
    pub arriving: Vec<(NodeId, Arrival)>,
}

impl Diff {
    pub fn compute(tree: &RouteTree, committed: &RouteSource, next: &RouteSource) -> Self {
        let leaving = committed
            .entries
            .keys()
            .filter(|id| !next.is_matched(**id))
            .copied()
            .collect();

        let arriving = next
            .entries
            .iter()
            .filter_map(|(id, entry)| match committed.entry(*id) {
                None => Some((*id, Arrival::Entering)),
                Some(previous) => {
                    let node = tree.node(*id)?;
                    let unchanged = previous.exact == entry.exact
                        && committed.segments_for(node) == next.segments_for(node);
                    (!unchanged).then_some((*id, Arrival::Updating))
                }
            })
            .collect();

        Self { leaving, arriving }
    }

    pub fn is_empty(&self) -> bool {
        self.leaving.is_empty() && self.arriving.is_empty()
    }

    pub fn is_touched(&self, id: NodeId) -> bool {
        self.leaving.contains(&id) || self.arriving.iter().any(|(a, _)| *a == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RouteDecl, RouterOptions, Schema};
    use crate::location::Query;
    use crate::routing::matcher::resolve;

    fn tree() -> RouteTree {
        let schema = Schema::new()
            .route(
                "users",
                RouteDecl::new().children(
                    Schema::new().route(
                        "user",
                        RouteDecl::new()
                            .matching("*")
                            .children(Schema::new().route("edit", RouteDecl::new())),
                    ),
                ),
            )
            .route("about", RouteDecl::new());
        RouteTree::build(&schema, &RouterOptions::default()).unwrap()
    }

    fn source(tree: &RouteTree, path: &str) -> RouteSource {
        resolve(tree, path, Query::default()).unwrap()
    }

    #[test]
    fn test_leaving_and_entering() {
        let tree = tree();
        let diff = Diff::compute(&tree, &source(&tree, "/users/1"), &source(&tree, "/about"));
        assert_eq!(diff.leaving, vec![0, 1]);
        assert_eq!(diff.arriving, vec![(3, Arrival::Entering)]);
    }

    #[test]
    fn test_unchanged_routes_are_untouched() {
        let tree = tree();
        let diff = Diff::compute(&tree, &source(&tree, "/users/1"), &source(&tree, "/users/1/edit"));
        assert!(diff.leaving.is_empty());
        // `user` loses exactness, `edit` enters, `users` is untouched.
        assert_eq!(diff.arriving, vec![(1, Arrival::Updating), (2, Arrival::Entering)]);
        assert!(!diff.is_touched(0));
    }

    #[test]
    fn test_ancestor_segment_change_updates_descendants() {
        let tree = tree();
        let diff = Diff::compute(&tree, &source(&tree, "/users/1/edit"), &source(&tree, "/users/2/edit"));
        assert_eq!(diff.arriving, vec![(1, Arrival::Updating), (2, Arrival::Updating)]);
    }

    #[test]
    fn test_same_state_is_empty() {
        let tree = tree();
        let diff = Diff::compute(&tree, &source(&tree, "/about"), &source(&tree, "/about"));
        assert!(diff.is_empty());
    }
}
