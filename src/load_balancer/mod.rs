//! Endpoint selection subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved target class
//!     → selector.rs
//!         PRIMARY → the primary endpoint
//!         REPLICA → registry's published healthy snapshot
//!             → Apply load balancing algorithm:
//!                 - round_robin.rs (rotate through the snapshot)
//!                 - random.rs (uniform pick)
//!                 - weighted.rs (smooth weighted round robin)
//!             → empty snapshot: degrade to the primary
//!     → Return endpoint id + connection handle
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless apart from an atomic cursor
//! - Strategies only ever see healthy replicas
//! - Selection never blocks and never fails

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::health::snapshot::HealthySnapshot;

pub mod endpoint;
pub mod random;
pub mod round_robin;
pub mod selector;
pub mod weighted;

pub use endpoint::{Endpoint, EndpointId, EndpointRole};
pub use selector::{EndpointSelector, Selection};

/// A fair selection strategy over a healthy snapshot.
pub trait LoadBalancer<H>: Send + Sync + Debug {
    /// Index into `snapshot.endpoints()`, or `None` if the snapshot is empty.
    fn next_index(&self, snapshot: &HealthySnapshot<H>) -> Option<usize>;
}

/// Configurable replica selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStrategy {
    #[default]
    RoundRobin,
    Random,
    WeightedRoundRobin,
}

impl BalanceStrategy {
    pub fn build<H>(self) -> Box<dyn LoadBalancer<H>> {
        match self {
            BalanceStrategy::RoundRobin => Box::new(round_robin::RoundRobin::new()),
            BalanceStrategy::Random => Box::new(random::Random::new()),
            BalanceStrategy::WeightedRoundRobin => Box::new(weighted::WeightedRoundRobin::new()),
        }
    }
}
