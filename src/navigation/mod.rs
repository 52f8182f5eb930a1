//! Navigation subsystem.
//!
//! # Data Flow
//! ```text
//! history location
//!     → router.rs request() (latest-location slot, generation bump)
//!     → drain loop (one transition at a time, superseded slots skipped)
//!     → routing::matcher::resolve → speculative snapshot (source.rs)
//!     → diff.rs (leaving / entering / updating)
//!     → hooks.rs guards (leave deepest-first, then enter/update)
//!     → commit: speculative → committed, node observables updated
//!     → hooks.rs after-hooks, change callback
//! ```
//!
//! # Design Decisions
//! - Single-threaded cooperative scheduling; no locks
//! - Committed state is only written in the commit step
//! - A veto is a normal outcome that reverts the history provider
//! - Hook failures abandon the transition and are logged, never raised

pub mod diff;
pub mod hooks;
pub mod router;
pub mod source;

use std::fmt;

use thiserror::Error;

use crate::navigation::hooks::{BoxError, HookKind};
use crate::routing::error::RouteError;

pub use hooks::{HookOutput, HookRegistration, Transition};
pub use router::Router;
pub use source::{RouteSource, RouteSources};

/// Errors that abandon a transition.
#[derive(Debug, Error)]
pub enum NavigationError {
    /// Matching the location failed.
    #[error("matching failed: {0}")]
    Route(#[from] RouteError),

    /// A hook returned an error.
    #[error("{kind} hook on `{route}` failed: {source}")]
    Hook {
        route: String,
        kind: HookKind,
        #[source]
        source: BoxError,
    },
}

/// Where the engine is in processing a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Matching,
    AwaitingBeforeHooks,
    Committed,
}

/// How a processed location ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// New state committed.
    Committed,
    /// Location equals the committed one.
    Unchanged,
    /// Location outside the configured prefix.
    OutOfPrefix,
    /// A guard on `route` returned false.
    Vetoed { route: String, kind: HookKind },
    /// A newer location was requested while hooks ran.
    Superseded,
    /// Matching or a hook failed; nothing was committed.
    Abandoned { reason: String },
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Committed => "committed",
            Outcome::Unchanged => "unchanged",
            Outcome::OutOfPrefix => "out_of_prefix",
            Outcome::Vetoed { .. } => "vetoed",
            Outcome::Superseded => "superseded",
            Outcome::Abandoned { .. } => "abandoned",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Vetoed { route, kind } => write!(f, "vetoed by {} on `{}`", kind, route),
            Outcome::Abandoned { reason } => write!(f, "abandoned: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}
