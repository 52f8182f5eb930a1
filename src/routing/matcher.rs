//! Route matching logic.
//!
//! # Responsibilities
//! - Match a single node against the head of a path
//! - Walk a subtree depth-first and return the matched chain
//! - Resolve the primary path and every `_<group>` query path into one
//!   merged set of entries
//!
//! # Design Decisions
//! - Siblings are tried in declaration order; first match wins
//! - A path fully consumed at a node ends the chain there (exact)
//! - An `$exact` node never ends a chain with segments left over
//! - A group slot only accepts chains whose deepest node is in that group
//! - Overlapping chains keep the first entry (primary before groups)

use std::collections::BTreeMap;

use serde::Serialize;

use crate::location::Query;
use crate::navigation::source::RouteSource;
use crate::routing::builder::RouteTree;
use crate::routing::error::RouteError;
use crate::routing::node::RouteNode;

/// Per-node match information stored in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchEntry {
    /// The node is the deepest match and consumed the whole path.
    pub exact: bool,
    /// Path text captured by this node.
    pub segment: String,
}

/// Result of matching one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatch<'p> {
    pub matched: bool,
    /// Nothing is left of the path after this node.
    pub exact: bool,
    pub captured: Option<&'p str>,
    pub rest: &'p str,
}

/// One node of a matched chain.
#[derive(Debug, Clone)]
pub struct ChainLink {
    pub node: RouteNode,
    pub exact: bool,
    pub segment: String,
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Matches `node` alone against the head of `path`.
pub fn match_node<'p>(node: &RouteNode, path: &'p str) -> Result<NodeMatch<'p>, RouteError> {
    let path = normalize(path);
    Ok(match node.pattern().match_at(node.key(), path)? {
        Some((captured, rest)) => NodeMatch {
            matched: true,
            exact: rest.is_empty(),
            captured: Some(captured),
            rest,
        },
        None => NodeMatch {
            matched: false,
            exact: false,
            captured: None,
            rest: path,
        },
    })
}

/// Chain from the first matching sibling of `roots` down to the deepest
/// match, or `None` when no sibling matches.
pub fn match_chain(roots: &[RouteNode], path: &str) -> Result<Option<Vec<ChainLink>>, RouteError> {
    let path = normalize(path);
    for root in roots {
        if let Some(chain) = match_subtree(root, path)? {
            return Ok(Some(chain));
        }
    }
    Ok(None)
}

/// Like [`match_chain`], skipping chains whose deepest node belongs to a
/// different group slot.
pub fn match_chain_in_group(
    roots: &[RouteNode],
    path: &str,
    group: Option<&str>,
) -> Result<Option<Vec<ChainLink>>, RouteError> {
    let path = normalize(path);
    for root in roots {
        if let Some(chain) = match_subtree(root, path)? {
            let leaf_group = chain.last().and_then(|link| link.node.group());
            if leaf_group == group {
                return Ok(Some(chain));
            }
        }
    }
    Ok(None)
}

fn match_subtree(node: &RouteNode, path: &str) -> Result<Option<Vec<ChainLink>>, RouteError> {
    let Some((captured, rest)) = node.pattern().match_at(node.key(), path)? else {
        return Ok(None);
    };

    if rest.is_empty() {
        return Ok(Some(vec![ChainLink {
            node: node.clone(),
            exact: true,
            segment: captured.to_string(),
        }]));
    }

    for child in node.children() {
        if let Some(mut chain) = match_subtree(child, rest)? {
            chain.insert(
                0,
                ChainLink {
                    node: node.clone(),
                    exact: false,
                    segment: captured.to_string(),
                },
            );
            return Ok(Some(chain));
        }
    }

    if node.is_exact_route() {
        return Ok(None);
    }
    Ok(Some(vec![ChainLink {
        node: node.clone(),
        exact: false,
        segment: captured.to_string(),
    }]))
}

/// Resolves a prefix-stripped pathname and its query into the next
/// snapshot.
///
/// Group paths are taken out of `query` (`_<group>` keys). The nearest
/// `$parallel` declaration on the primary chain, deepest first, decides
/// which group chains are kept.
pub fn resolve(tree: &RouteTree, pathname: &str, mut query: Query) -> Result<RouteSource, RouteError> {
    let mut group_paths = BTreeMap::new();
    for group in tree.groups() {
        if let Some(path) = query.remove(&format!("_{}", group)) {
            group_paths.insert(group.clone(), path);
        }
    }

    let mut source = RouteSource {
        query,
        ..RouteSource::default()
    };
    source
        .paths
        .insert(None, format!("/{}", normalize(pathname)));

    let primary = match_chain_in_group(tree.roots(), pathname, None)?.unwrap_or_default();
    let whitelist = primary
        .iter()
        .rev()
        .find_map(|link| link.node.parallel().cloned());
    add_chain(&mut source, &primary);

    for (group, path) in group_paths {
        let Some(chain) = match_chain_in_group(tree.roots(), &path, Some(&group))? else {
            tracing::debug!(group = %group, path = %path, "Group path matched no route");
            continue;
        };
        let leaf = chain.last().map(|link| link.node.id());
        let allowed = match (&whitelist, leaf) {
            (Some(parallel), Some(leaf)) => parallel.allows(&group, leaf),
            _ => true,
        };
        if !allowed {
            tracing::debug!(group = %group, path = %path, "Group excluded by parallel whitelist");
            continue;
        }
        add_chain(&mut source, &chain);
        source
            .paths
            .insert(Some(group), format!("/{}", normalize(&path)));
    }

    Ok(source)
}

fn add_chain(source: &mut RouteSource, chain: &[ChainLink]) {
    for link in chain {
        source
            .entries
            .entry(link.node.id())
            .or_insert_with(|| MatchEntry {
                exact: link.exact,
                segment: link.segment.clone(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RouteDecl, RouterOptions, Schema};

    fn tree(schema: Schema) -> RouteTree {
        RouteTree::build(&schema, &RouterOptions::default()).unwrap()
    }

    fn keys(chain: &[ChainLink]) -> Vec<String> {
        chain.iter().map(|l| l.node.key().to_string()).collect()
    }

    #[test]
    fn test_match_node() {
        let tree = tree(Schema::new().route("users", RouteDecl::new()));
        let users = tree.get("users").unwrap();

        let hit = match_node(users, "/users/7").unwrap();
        assert!(hit.matched);
        assert!(!hit.exact);
        assert_eq!(hit.captured, Some("users"));
        assert_eq!(hit.rest, "7");

        let miss = match_node(users, "/about").unwrap();
        assert!(!miss.matched);
        assert_eq!(miss.captured, None);
    }

    #[test]
    fn test_first_declared_sibling_wins() {
        let tree = tree(
            Schema::new()
                .route("any", RouteDecl::new().matching("*"))
                .route("about", RouteDecl::new()),
        );
        let chain = match_chain(tree.roots(), "/about").unwrap().unwrap();
        assert_eq!(keys(&chain), vec!["any"]);
    }

    #[test]
    fn test_chain_includes_ancestors() {
        let tree = tree(Schema::new().route(
            "users",
            RouteDecl::new().children(
                Schema::new().route(
                    "user",
                    RouteDecl::new()
                        .matching("*")
                        .children(Schema::new().route("edit", RouteDecl::new())),
                ),
            ),
        ));
        let chain = match_chain(tree.roots(), "/users/7/edit").unwrap().unwrap();
        assert_eq!(keys(&chain), vec!["users", "users.user", "users.user.edit"]);
        assert_eq!(chain[1].segment, "7");
        assert!(chain[2].exact);
        assert!(!chain[0].exact && !chain[1].exact);
    }

    #[test]
    fn test_non_exact_node_matches_as_prefix() {
        let tree = tree(Schema::new().route("docs", RouteDecl::new()));
        let chain = match_chain(tree.roots(), "/docs/intro").unwrap().unwrap();
        assert_eq!(keys(&chain), vec!["docs"]);
        assert!(!chain[0].exact);
    }

    #[test]
    fn test_exact_node_rejects_descendant_paths() {
        let tree = tree(
            Schema::new()
                .route(
                    "parent",
                    RouteDecl::new()
                        .exact()
                        .children(Schema::new().route("nested", RouteDecl::new())),
                )
                .route("fallback", RouteDecl::new().matching("**")),
        );

        let chain = match_chain(tree.roots(), "/parent").unwrap().unwrap();
        assert_eq!(keys(&chain), vec!["parent"]);
        assert!(chain[0].exact);

        let chain = match_chain(tree.roots(), "/parent/nested").unwrap().unwrap();
        assert_eq!(keys(&chain), vec!["parent", "parent.nested"]);

        let chain = match_chain(tree.roots(), "/parent/other").unwrap().unwrap();
        assert_eq!(keys(&chain), vec!["fallback"]);
        assert_eq!(chain[0].segment, "parent/other");
    }

    #[test]
    fn test_no_match_returns_none() {
        let tree = tree(Schema::new().route("about", RouteDecl::new()));
        assert!(match_chain(tree.roots(), "/contact").unwrap().is_none());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let tree = tree(Schema::new().route(
            "a",
            RouteDecl::new().children(
                Schema::new()
                    .route("x", RouteDecl::new().regex("x+", ""))
                    .route("y", RouteDecl::new().matching("*")),
            ),
        ));
        let first = keys(&match_chain(tree.roots(), "/a/xx").unwrap().unwrap());
        let second = keys(&match_chain(tree.roots(), "/a/xx").unwrap().unwrap());
        assert_eq!(first, second);
        assert_eq!(first, vec!["a", "a.x"]);
    }

    #[test]
    fn test_unterminated_regex_is_an_error() {
        let tree = tree(Schema::new().route("id", RouteDecl::new().regex(r"\d+", "")));
        let err = match_chain(tree.roots(), "/12ab").unwrap_err();
        assert!(matches!(err, RouteError::UnterminatedMatch { .. }));
    }

    fn grouped_tree() -> RouteTree {
        tree(
            Schema::new()
                .route("home", RouteDecl::new().matching("").parallel(["side"], Vec::<String>::new()))
                .route("about", RouteDecl::new())
                .route(
                    "help",
                    RouteDecl::new()
                        .group("side")
                        .children(Schema::new().route("topic", RouteDecl::new().matching("*"))),
                )
                .route("chat", RouteDecl::new().group("dock")),
        )
    }

    #[test]
    fn test_resolve_primary_and_groups() {
        let tree = grouped_tree();
        let source = resolve(&tree, "/about", Query::parse("_side=/help/faq&_dock=/chat&q=1")).unwrap();

        let about = tree.get("about").unwrap().id();
        let topic = tree.get("help.topic").unwrap().id();
        let chat = tree.get("chat").unwrap().id();
        assert!(source.is_matched(about));
        assert!(source.is_matched(topic));
        assert!(source.is_matched(chat));
        assert_eq!(source.entry(topic).unwrap().segment, "faq");

        assert_eq!(source.query.get("q"), Some("1"));
        assert!(!source.query.contains("_side"));
        assert_eq!(source.paths.get(&None).map(String::as_str), Some("/about"));
        assert_eq!(source.paths.get(&Some("side".into())).map(String::as_str), Some("/help/faq"));
    }

    #[test]
    fn test_group_slot_rejects_primary_routes() {
        let tree = grouped_tree();
        let source = resolve(&tree, "/help", Query::parse("_side=/about")).unwrap();
        assert!(source.entries.is_empty());
    }

    #[test]
    fn test_parallel_whitelist_filters_groups() {
        let tree = grouped_tree();
        let source = resolve(&tree, "/", Query::parse("_side=/help&_dock=/chat")).unwrap();
        assert!(source.is_matched(tree.get("home").unwrap().id()));
        assert!(source.is_matched(tree.get("help").unwrap().id()));
        assert!(!source.is_matched(tree.get("chat").unwrap().id()));
        assert!(!source.paths.contains_key(&Some("dock".into())));
    }

    #[test]
    fn test_parallel_matches_keep_named_leaves() {
        let tree = tree(
            Schema::new()
                .route("home", RouteDecl::new().matching("").parallel(Vec::<String>::new(), ["chat"]))
                .route("help", RouteDecl::new().group("side"))
                .route("chat", RouteDecl::new().group("dock")),
        );
        let source = resolve(&tree, "/", Query::parse("_dock=/chat&_side=/help")).unwrap();
        assert!(source.is_matched(tree.get("chat").unwrap().id()));
        assert!(!source.is_matched(tree.get("help").unwrap().id()));
        assert!(source.paths.contains_key(&Some("dock".into())));
        assert!(!source.paths.contains_key(&Some("side".into())));
    }

    #[test]
    fn test_match_entry_serializes_flat() {
        let entry = MatchEntry { exact: true, segment: "42".into() };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, serde_json::json!({ "exact": true, "segment": "42" }));
    }
}
