//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Registry, resolver and selector produce:
//!     → tracing events (state transitions, degradations, unclassified calls)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers (installed by the host application):
//!     → logging.rs (tracing subscriber, pretty or JSON)
//!     → any `metrics` recorder
//! ```
//!
//! # Design Decisions
//! - Structured fields (endpoint, status, counts) rather than formatted strings
//! - Per-call routing decisions log at DEBUG; degradations at WARN
//! - Metrics are cheap (atomic increments) and optional

pub mod logging;
pub mod metrics;
