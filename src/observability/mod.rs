//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router transitions produce:
//!     → tracing spans/events (one span per transition, generation + target)
//!     → metrics.rs (transition outcomes, hook verdicts, durations)
//!
//! Consumers:
//!     → logging.rs subscriber (CLI, tests, embedding apps)
//!     → whatever `metrics` recorder the embedding app installs
//! ```
//!
//! # Design Decisions
//! - Structured fields (route keys, locations) rather than formatted text
//! - Metrics go through the `metrics` facade; no exporter is bundled
//! - Recording without an installed recorder is a no-op

pub mod logging;
pub mod metrics;
