//! Read/write splitting router for a primary database and its replicas.
//!
//! Every data-access call is routed either to the single writable primary or
//! to one of the healthy read-only replicas. Writes and everything inside a
//! write transaction stay on the primary; reads spread over replicas that an
//! active health monitor currently considers healthy, and fall back to the
//! primary when none are.

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod routing;

pub use config::schema::RouterConfig;
pub use health::{HealthProbe, HealthReport, HealthState, ProbeError};
pub use lifecycle::Shutdown;
pub use load_balancer::{BalanceStrategy, Endpoint, EndpointId, EndpointRole};
pub use routing::{
    CallMetadata, ReadWriteRouter, RouteDecision, RouterBuilder, RoutingContext, TargetClass,
    TransactionMode,
};
