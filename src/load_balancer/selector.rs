//! Endpoint selection.
//!
//! # Responsibilities
//! - Map a resolved target class to a concrete endpoint
//! - Apply the configured load balancing algorithm to healthy replicas
//! - Degrade reads to the primary when no replica is healthy

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::health::registry::ReplicaHealthRegistry;
use crate::load_balancer::{
    endpoint::{Endpoint, EndpointId, EndpointRole},
    BalanceStrategy, LoadBalancer,
};
use crate::observability::metrics;
use crate::routing::types::TargetClass;

/// Endpoint picked for one call.
#[derive(Debug, Clone)]
pub struct Selection<H> {
    pub endpoint_id: EndpointId,
    pub handle: H,
    pub served_by: EndpointRole,
    /// A replica was requested but the primary was returned.
    pub degraded: bool,
}

impl<H: Clone> Selection<H> {
    fn of(endpoint: &Endpoint<H>, degraded: bool) -> Self {
        Self {
            endpoint_id: endpoint.id.clone(),
            handle: endpoint.handle.clone(),
            served_by: endpoint.role,
            degraded,
        }
    }
}

/// Turns a target class into an endpoint.
#[derive(Debug)]
pub struct EndpointSelector<H> {
    primary: Endpoint<H>,
    registry: Arc<ReplicaHealthRegistry<H>>,
    balancer: Box<dyn LoadBalancer<H>>,
    degraded_reads: AtomicU64,
}

impl<H> EndpointSelector<H>
where
    H: Clone + Send + Sync + 'static,
{
    pub fn new(
        primary: Endpoint<H>,
        registry: Arc<ReplicaHealthRegistry<H>>,
        strategy: BalanceStrategy,
    ) -> Self {
        Self::with_balancer(primary, registry, strategy.build())
    }

    /// Use a custom strategy instead of one of the built-in ones.
    pub fn with_balancer(
        primary: Endpoint<H>,
        registry: Arc<ReplicaHealthRegistry<H>>,
        balancer: Box<dyn LoadBalancer<H>>,
    ) -> Self {
        Self {
            primary,
            registry,
            balancer,
            degraded_reads: AtomicU64::new(0),
        }
    }

    /// Select the endpoint for `target`. Never fails and never blocks.
    pub fn select(&self, target: TargetClass) -> Selection<H> {
        match target {
            TargetClass::Primary => Selection::of(&self.primary, false),
            TargetClass::Replica => self.select_replica(),
        }
    }

    fn select_replica(&self) -> Selection<H> {
        let snapshot = self.registry.healthy_snapshot();

        if let Some(endpoint) = self
            .balancer
            .next_index(&snapshot)
            .and_then(|index| snapshot.get(index))
        {
            tracing::debug!(
                endpoint = %endpoint.id,
                healthy = snapshot.len(),
                generation = snapshot.generation(),
                "Selected replica"
            );
            return Selection::of(endpoint, false);
        }

        self.degraded_reads.fetch_add(1, Ordering::Relaxed);
        metrics::record_read_degraded();
        tracing::warn!(
            primary = %self.primary.id,
            registered = self.registry.len(),
            healthy = snapshot.len(),
            "Read degraded to primary: no healthy replica"
        );
        Selection::of(&self.primary, true)
    }

    pub fn primary(&self) -> &Endpoint<H> {
        &self.primary
    }

    /// Number of replica reads served by the primary so far.
    pub fn degraded_reads(&self) -> u64 {
        self.degraded_reads.load(Ordering::Relaxed)
    }
}
