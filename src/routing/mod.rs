//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at construction):
//!     Schema
//!     → builder.rs (instantiate nodes, derive patterns, collect groups)
//!     → pattern.rs (compile literal / wildcard / regex patterns)
//!     → RouteTree (pre-order ids, dotted-name table)
//!
//! Resolution (per location):
//!     prefix-stripped path + query
//!     → matcher.rs (first-match chains, one per group slot)
//!     → parallel whitelist filter
//!     → RouteSource (entries, query, per-group paths)
//! ```
//!
//! # Design Decisions
//! - Nodes are compiled once and never recreated; navigation only mutates
//!   their committed and speculative state
//! - Deterministic: same input always matches same chain
//! - First match wins (declaration order, not specificity)
//! - Pattern misconfiguration fails at build time

pub mod builder;
pub mod error;
pub mod matcher;
pub mod node;
pub mod pattern;

pub use builder::RouteTree;
pub use error::RouteError;
pub use matcher::{match_chain, match_node, resolve, ChainLink, MatchEntry, NodeMatch};
pub use node::{NodeId, NodeState, Parallel, RouteNode};
pub use pattern::Pattern;
