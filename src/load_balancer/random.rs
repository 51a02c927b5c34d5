//! Uniform random load balancing strategy.

use rand::Rng;

use crate::health::snapshot::HealthySnapshot;
use crate::load_balancer::LoadBalancer;

/// Picks a uniformly random member of the snapshot.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl<H> LoadBalancer<H> for Random {
    fn next_index(&self, snapshot: &HealthySnapshot<H>) -> Option<usize> {
        match snapshot.len() {
            0 => None,
            1 => Some(0),
            len => Some(rand::thread_rng().gen_range(0..len)),
        }
    }
}
