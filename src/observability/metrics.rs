//! Metrics collection.
//!
//! # Metrics
//! - `router_transitions_total` (counter): transitions by outcome
//! - `router_transition_duration_seconds` (histogram): processing latency
//! - `router_hooks_total` (counter): hook invocations by kind and verdict
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Labels are static strings only

use std::time::Instant;

use crate::navigation::hooks::HookKind;

pub fn record_transition(outcome: &'static str) {
    ::metrics::counter!("router_transitions_total", "outcome" => outcome).increment(1);
}

pub fn record_transition_duration(start: Instant) {
    ::metrics::histogram!("router_transition_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_hook(kind: HookKind, allowed: bool) {
    let verdict = if allowed { "allow" } else { "veto" };
    ::metrics::counter!("router_hooks_total", "kind" => kind.as_str(), "verdict" => verdict)
        .increment(1);
}
