//! Replica health state machine.
//!
//! # States
//! - Unknown: registered, not probed yet; excluded from selection
//! - Healthy: replica receives read traffic
//! - Unhealthy: replica excluded from selection
//!
//! # State Transitions
//! ```text
//! Unknown   → Healthy:   first successful probe
//! Unknown   → Unhealthy: consecutive failures >= unhealthy_threshold
//! Healthy   → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy → Healthy:   first successful probe
//! ```
//!
//! # Design Decisions
//! - Hysteresis on the way down only; recovery is immediate
//! - Failure counter resets on any success
//! - Transitions are returned to the caller so it can log and republish

use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

use crate::load_balancer::endpoint::EndpointId;

/// Health state of one replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Unknown => "UNKNOWN",
            HealthState::Healthy => "HEALTHY",
            HealthState::Unhealthy => "UNHEALTHY",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single liveness check, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    Failure,
}

/// A status change produced by applying a probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: HealthState,
    pub to: HealthState,
}

/// Mutable health record of one replica.
#[derive(Debug, Clone)]
pub struct ReplicaHealthState {
    pub status: HealthState,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<SystemTime>,
    pub last_status_change_at: SystemTime,
}

impl ReplicaHealthState {
    /// Fresh record for a just-registered replica.
    pub fn new(registered_at: SystemTime) -> Self {
        Self {
            status: HealthState::Unknown,
            consecutive_failures: 0,
            last_checked_at: None,
            last_status_change_at: registered_at,
        }
    }

    /// Apply one probe outcome.
    ///
    /// Returns the transition when the status changed.
    pub fn apply(
        &mut self,
        outcome: ProbeOutcome,
        unhealthy_threshold: u32,
        now: SystemTime,
    ) -> Option<Transition> {
        self.last_checked_at = Some(now);

        let next = match outcome {
            ProbeOutcome::Success => {
                self.consecutive_failures = 0;
                HealthState::Healthy
            }
            ProbeOutcome::Failure => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= unhealthy_threshold {
                    HealthState::Unhealthy
                } else {
                    self.status
                }
            }
        };

        if next == self.status {
            return None;
        }

        let transition = Transition {
            from: self.status,
            to: next,
        };
        self.status = next;
        self.last_status_change_at = now;
        Some(transition)
    }
}

/// Point-in-time view of one replica for dashboards and introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub endpoint_id: EndpointId,
    pub status: HealthState,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<SystemTime>,
    pub last_status_change_at: SystemTime,
    /// Held out of rotation by an operator regardless of status.
    pub drained: bool,
}

impl HealthReport {
    pub fn new(endpoint_id: EndpointId, state: &ReplicaHealthState) -> Self {
        Self {
            endpoint_id,
            status: state.status,
            consecutive_failures: state.consecutive_failures,
            last_checked_at: state.last_checked_at,
            last_status_change_at: state.last_status_change_at,
            drained: false,
        }
    }
}
