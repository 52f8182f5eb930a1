//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! routes file (TOML/JSON)            router file (TOML/JSON)
//!     → loader.rs (parse, order kept)    → loader.rs (parse)
//!     → Schema                           → validation.rs (semantic checks)
//!     → routing::builder                 → RouterConfig
//!                                        → RouterOptions (+ callbacks)
//! ```
//!
//! # Design Decisions
//! - Declaration order of routes is preserved; first match wins at runtime
//! - All router fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Callbacks cannot be serialized, so they live on RouterOptions only

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{MatchDecl, ParallelDecl, RouteDecl, RouterConfig, RouterOptions, Schema};
