//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Data-access call (CallMetadata + RoutingContext)
//!     → policy.rs (hint → forced context → write transaction → method name)
//!         → matcher.rs (read/write prefix classification)
//!     → TargetClass (PRIMARY | REPLICA)
//!     → router.rs hands the target to the endpoint selector
//!     → Return: RouteDecision (endpoint id + handle)
//!
//! Forced scopes (context.rs):
//!     with_forced(target) → nested calls inherit → scope exit restores parent
//! ```
//!
//! # Design Decisions
//! - Prefixes compiled at construction, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same metadata and context always resolve the same way
//! - Unmatched calls go to the primary, never to a replica

pub mod context;
pub mod matcher;
pub mod policy;
pub mod router;
pub mod types;

pub use context::{ContextGuard, RoutingContext};
pub use matcher::MethodClassifier;
pub use policy::RoutingPolicyResolver;
pub use router::{ReadWriteRouter, ReconcileSummary, RouterBuilder, RouterStats};
pub use types::{CallMetadata, DecisionSource, RouteDecision, TargetClass, TransactionMode};
