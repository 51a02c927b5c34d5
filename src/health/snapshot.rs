//! Immutable healthy-set snapshot.
//!
//! The registry builds a new `HealthySnapshot` whenever a replica changes
//! status and publishes it with a single atomic swap. A snapshot handed to a
//! reader is never mutated afterwards.

use std::sync::OnceLock;

use crate::load_balancer::endpoint::{Endpoint, EndpointId};
use crate::load_balancer::weighted::smooth_schedule;

/// The replicas currently eligible for read traffic.
#[derive(Debug)]
pub struct HealthySnapshot<H> {
    generation: u64,
    endpoints: Vec<Endpoint<H>>,
    schedule: OnceLock<Vec<usize>>,
}

impl<H> HealthySnapshot<H> {
    /// Build a snapshot; `endpoints` must already be in registration order.
    pub fn new(generation: u64, endpoints: Vec<Endpoint<H>>) -> Self {
        Self {
            generation,
            endpoints,
            schedule: OnceLock::new(),
        }
    }

    /// The snapshot published before any replica was probed.
    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    /// Publication counter; strictly increases with each published snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn endpoints(&self) -> &[Endpoint<H>] {
        &self.endpoints
    }

    pub fn get(&self, index: usize) -> Option<&Endpoint<H>> {
        self.endpoints.get(index)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn contains(&self, id: &EndpointId) -> bool {
        self.endpoints.iter().any(|e| &e.id == id)
    }

    pub fn ids(&self) -> Vec<EndpointId> {
        self.endpoints.iter().map(|e| e.id.clone()).collect()
    }

    /// Smooth weighted round-robin order over this snapshot, computed once.
    pub fn weighted_schedule(&self) -> &[usize] {
        self.schedule.get_or_init(|| {
            let weights: Vec<u32> = self.endpoints.iter().map(|e| e.weight).collect();
            smooth_schedule(&weights)
        })
    }
}
