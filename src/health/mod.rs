//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → registry.rs runs one cycle
//!     → probe.rs checks each replica (bounded concurrency, per-probe timeout)
//!     → state.rs applies the outcome
//!     → snapshot.rs receives a new healthy set when a status changes
//!
//! State machine (state.rs):
//!     UNKNOWN → HEALTHY   on first success
//!     UNKNOWN → UNHEALTHY after threshold consecutive failures
//!     HEALTHY ←→ UNHEALTHY with the same rules
//! ```
//!
//! # Design Decisions
//! - Only replicas are tracked; the primary is always eligible for writes
//! - A single success restores a replica, failures must accumulate
//! - Readers only ever see published snapshots

pub mod active;
pub mod probe;
pub mod registry;
pub mod snapshot;
pub mod state;

pub use active::HealthMonitor;
pub use probe::{HealthProbe, ProbeError, TcpConnectProbe};
pub use registry::{CycleSummary, RegistryError, ReplicaHealthRegistry};
pub use snapshot::HealthySnapshot;
pub use state::{HealthReport, HealthState};
