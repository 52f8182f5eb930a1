//! Nested route matching and navigation lifecycle engine.
//!
//! A declarative schema compiles into a tree of routes. The navigation
//! engine follows a history provider, matches each location against the
//! tree and moves routes between committed states through guard and
//! notification hooks.

pub mod config;
pub mod history;
pub mod location;
pub mod navigation;
pub mod observability;
pub mod observable;
pub mod routing;

pub use config::{RouteDecl, RouterConfig, RouterOptions, Schema};
pub use history::{History, MemoryHistory};
pub use location::{Location, Query};
pub use navigation::{EngineState, NavigationError, Outcome, Router, Transition};
pub use observable::{Observable, Subscription};
pub use routing::{RouteError, RouteNode, RouteTree};
