//! Smooth weighted round-robin load balancing strategy.
//!
//! The interleaved order is computed once per published snapshot (see
//! `HealthySnapshot::weighted_schedule`) and walked with an atomic cursor,
//! so picking stays lock-free on the request path.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::health::snapshot::HealthySnapshot;
use crate::load_balancer::LoadBalancer;

/// Compute one period of the smooth weighted round-robin sequence.
///
/// Each entry is an index into `weights`; index `i` appears exactly
/// `weights[i]` times and heavy entries are spread out rather than bunched.
/// Zero weights are treated as 1.
pub fn smooth_schedule(weights: &[u32]) -> Vec<usize> {
    let weights: Vec<i64> = weights.iter().map(|w| i64::from((*w).max(1))).collect();
    let total: i64 = weights.iter().sum();
    let mut current = vec![0i64; weights.len()];
    let mut schedule = Vec::with_capacity(total as usize);

    for _ in 0..total {
        let mut best = 0;
        for (i, weight) in weights.iter().enumerate() {
            current[i] += weight;
            if current[i] > current[best] {
                best = i;
            }
        }
        current[best] -= total;
        schedule.push(best);
    }
    schedule
}

/// Weighted round-robin selector.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    cursor: AtomicUsize,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H> LoadBalancer<H> for WeightedRoundRobin {
    fn next_index(&self, snapshot: &HealthySnapshot<H>) -> Option<usize> {
        let schedule = snapshot.weighted_schedule();
        if schedule.is_empty() {
            return None;
        }
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % schedule.len();
        Some(schedule[slot])
    }
}
