//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::health::snapshot::HealthySnapshot;
use crate::load_balancer::LoadBalancer;

/// Round-robin selector.
/// Advances a shared cursor modulo the size of the snapshot it is handed.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H> LoadBalancer<H> for RoundRobin {
    fn next_index(&self, snapshot: &HealthySnapshot<H>) -> Option<usize> {
        if snapshot.is_empty() {
            return None;
        }
        // Snapshots only hold healthy replicas, no need to skip entries here.
        Some(self.counter.fetch_add(1, Ordering::Relaxed) % snapshot.len())
    }
}
