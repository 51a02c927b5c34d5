//! Replica health registry.
//!
//! # Responsibilities
//! - Own per-replica health state (status, failure count, timestamps)
//! - Probe replicas with bounded concurrency and apply the state machine
//! - Publish the healthy set as an immutable snapshot
//! - Let operators drain a replica out of rotation without losing its health history
//!
//! # Design Decisions
//! - Health state lives in a `DashMap`, so writes are linearizable per endpoint
//! - The healthy set is published through `ArcSwap`; readers never lock
//! - Snapshot rebuilds are serialized so an older rebuild never overwrites a newer one
//! - Probe outcomes carry the registration they were issued for; outcomes for a
//!   replica that was removed (or removed and re-added) meanwhile are dropped

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::config::validation::MAX_WEIGHT;
use crate::config::{HealthCheckConfig, ValidationError};
use crate::health::probe::{run_probe, HealthProbe, ProbeError};
use crate::health::snapshot::HealthySnapshot;
use crate::health::state::{HealthReport, HealthState, ProbeOutcome, ReplicaHealthState};
use crate::load_balancer::endpoint::{Endpoint, EndpointId, EndpointRole};
use crate::observability::metrics;

/// Errors returned by registry management operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("endpoint '{0}' is already registered")]
    Duplicate(EndpointId),

    #[error("endpoint '{0}' is not registered")]
    UnknownEndpoint(EndpointId),

    #[error("endpoint '{0}' is a primary; only replicas are health-tracked")]
    NotAReplica(EndpointId),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

struct TrackedEndpoint<H> {
    endpoint: Endpoint<H>,
    registration: u64,
    state: ReplicaHealthState,
    /// Held out of rotation by an operator; still probed.
    drained: bool,
}

impl<H> TrackedEndpoint<H> {
    fn report(&self) -> HealthReport {
        HealthReport {
            drained: self.drained,
            ..HealthReport::new(self.endpoint.id.clone(), &self.state)
        }
    }

    fn in_rotation(&self) -> bool {
        self.state.status == HealthState::Healthy && !self.drained
    }
}

/// Probe parameters taken from `HealthCheckConfig`.
#[derive(Debug, Clone, Copy)]
struct ProbeSettings {
    unhealthy_threshold: u32,
    probe_timeout: Duration,
    max_concurrent_probes: usize,
}

/// Result of one probing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub probed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub healthy: usize,
}

/// Health state of every registered replica plus the published healthy set.
pub struct ReplicaHealthRegistry<H> {
    entries: DashMap<EndpointId, TrackedEndpoint<H>>,
    healthy: ArcSwap<HealthySnapshot<H>>,
    /// Guards snapshot rebuilds; holds the last published generation.
    publish: Mutex<u64>,
    registrations: AtomicU64,
    probe: Arc<dyn HealthProbe<H>>,
    settings: ProbeSettings,
}

impl<H> ReplicaHealthRegistry<H>
where
    H: Clone + Send + Sync + 'static,
{
    pub fn new(probe: Arc<dyn HealthProbe<H>>, config: &HealthCheckConfig) -> Self {
        Self {
            entries: DashMap::new(),
            healthy: ArcSwap::from_pointee(HealthySnapshot::empty()),
            publish: Mutex::new(0),
            registrations: AtomicU64::new(0),
            probe,
            settings: ProbeSettings {
                unhealthy_threshold: config.unhealthy_threshold,
                probe_timeout: Duration::from_millis(config.timeout_ms),
                max_concurrent_probes: config.max_concurrent_probes.max(1),
            },
        }
    }

    /// Start tracking a replica. Its status is UNKNOWN until the first probe.
    pub fn register(&self, endpoint: Endpoint<H>) -> Result<(), RegistryError> {
        if endpoint.role != EndpointRole::Replica {
            return Err(RegistryError::NotAReplica(endpoint.id));
        }
        if endpoint.id.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyEndpointId.into());
        }
        if endpoint.weight == 0 || endpoint.weight > MAX_WEIGHT {
            return Err(ValidationError::InvalidWeight {
                id: endpoint.id.to_string(),
                weight: endpoint.weight,
                max: MAX_WEIGHT,
            }
            .into());
        }

        match self.entries.entry(endpoint.id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate(endpoint.id)),
            Entry::Vacant(slot) => {
                let registration = self.registrations.fetch_add(1, Ordering::Relaxed);
                let id = endpoint.id.clone();
                slot.insert(TrackedEndpoint {
                    endpoint,
                    registration,
                    state: ReplicaHealthState::new(SystemTime::now()),
                    drained: false,
                });
                metrics::record_endpoint_health(&id, HealthState::Unknown);
                tracing::info!(endpoint = %id, "Registered replica");
                Ok(())
            }
        }
    }

    /// Stop tracking a replica. Calls that already hold its handle are unaffected.
    pub fn unregister(&self, id: &EndpointId) -> Result<(), RegistryError> {
        let (_, removed) = self
            .entries
            .remove(id)
            .ok_or_else(|| RegistryError::UnknownEndpoint(id.clone()))?;

        tracing::info!(endpoint = %id, status = %removed.state.status, "Unregistered replica");
        if removed.in_rotation() {
            self.publish();
        }
        Ok(())
    }

    /// Take a replica out of rotation, or put it back.
    ///
    /// A drained replica keeps being probed, so undraining a healthy one
    /// restores it without waiting for the next cycle.
    pub fn set_drained(
        &self,
        id: &EndpointId,
        drained: bool,
    ) -> Result<HealthReport, RegistryError> {
        let (changed, report) = {
            let mut entry = self
                .entries
                .get_mut(id)
                .ok_or_else(|| RegistryError::UnknownEndpoint(id.clone()))?;
            let changed = entry.drained != drained;
            entry.drained = drained;
            (changed, entry.report())
        };

        if changed {
            if drained {
                tracing::warn!(endpoint = %id, status = %report.status, "Replica drained");
            } else {
                tracing::info!(endpoint = %id, status = %report.status, "Replica undrained");
            }
            if report.status == HealthState::Healthy {
                self.publish();
            }
        }
        Ok(report)
    }

    /// Current healthy set. Lock-free; the returned snapshot never changes.
    pub fn healthy_snapshot(&self) -> Arc<HealthySnapshot<H>> {
        self.healthy.load_full()
    }

    /// Number of registered replicas, whatever their status.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &EndpointId) -> bool {
        self.entries.contains_key(id)
    }

    /// Registered replica definitions, in registration order.
    pub fn endpoints(&self) -> Vec<Endpoint<H>> {
        self.tracked().into_iter().map(|(endpoint, _)| endpoint).collect()
    }

    /// Health reports for every registered replica, in registration order.
    pub fn health_status(&self) -> Vec<HealthReport> {
        let mut reports: Vec<(u64, HealthReport)> = self
            .entries
            .iter()
            .map(|e| (e.registration, e.report()))
            .collect();
        reports.sort_by_key(|(registration, _)| *registration);
        reports.into_iter().map(|(_, report)| report).collect()
    }

    pub fn report(&self, id: &EndpointId) -> Option<HealthReport> {
        self.entries.get(id).map(|e| e.report())
    }

    /// Probe every registered replica once.
    pub async fn run_cycle(&self) -> CycleSummary {
        let targets = self.tracked();
        let mut summary = CycleSummary {
            probed: targets.len(),
            ..CycleSummary::default()
        };
        if targets.is_empty() {
            return summary;
        }

        tracing::debug!(replicas = targets.len(), "Starting health check cycle");

        let timeout = self.settings.probe_timeout;
        let mut results = stream::iter(targets)
            .map(|(endpoint, registration)| {
                let probe = self.probe.clone();
                async move {
                    let id = endpoint.id.clone();
                    let result = run_probe(probe, endpoint, timeout).await;
                    (id, registration, result)
                }
            })
            .buffer_unordered(self.settings.max_concurrent_probes);

        while let Some((id, registration, result)) = results.next().await {
            if result.is_ok() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            self.record(&id, registration, result);
        }

        summary.healthy = self.healthy_snapshot().len();
        tracing::debug!(
            probed = summary.probed,
            failed = summary.failed,
            healthy = summary.healthy,
            "Health check cycle complete"
        );
        summary
    }

    /// Operator-initiated probe of one replica, outside the periodic cycle.
    pub async fn manual_refresh(&self, id: &EndpointId) -> Result<HealthReport, RegistryError> {
        let (endpoint, registration) = self
            .entries
            .get(id)
            .map(|e| (e.endpoint.clone(), e.registration))
            .ok_or_else(|| RegistryError::UnknownEndpoint(id.clone()))?;

        tracing::info!(endpoint = %id, "Manual health refresh");
        let result = run_probe(self.probe.clone(), endpoint, self.settings.probe_timeout).await;
        self.record(id, registration, result)
            .ok_or_else(|| RegistryError::UnknownEndpoint(id.clone()))
    }

    /// Operator-initiated probe of every replica.
    pub async fn refresh_all(&self) -> CycleSummary {
        tracing::info!(replicas = self.len(), "Manual health refresh of all replicas");
        self.run_cycle().await
    }

    fn tracked(&self) -> Vec<(Endpoint<H>, u64)> {
        let mut tracked: Vec<(Endpoint<H>, u64)> = self
            .entries
            .iter()
            .map(|e| (e.endpoint.clone(), e.registration))
            .collect();
        tracked.sort_by_key(|(_, registration)| *registration);
        tracked
    }

    /// Feed one probe result into the state machine.
    fn record(
        &self,
        id: &EndpointId,
        registration: u64,
        result: Result<(), ProbeError>,
    ) -> Option<HealthReport> {
        let outcome = match &result {
            Ok(()) => {
                tracing::debug!(endpoint = %id, "Health check passed");
                ProbeOutcome::Success
            }
            Err(e) => {
                tracing::warn!(endpoint = %id, error = %e, "Health check failed");
                ProbeOutcome::Failure
            }
        };

        let (transition, report) = {
            let mut entry = match self.entries.get_mut(id) {
                Some(entry) if entry.registration == registration => entry,
                _ => {
                    tracing::debug!(endpoint = %id, "Discarding probe result for unregistered replica");
                    return None;
                }
            };
            metrics::record_probe(id, result.is_ok());
            let transition =
                entry
                    .state
                    .apply(outcome, self.settings.unhealthy_threshold, SystemTime::now());
            (transition, entry.report())
        };

        if let Some(t) = transition {
            metrics::record_endpoint_health(id, t.to);
            match t.to {
                HealthState::Unhealthy => tracing::error!(
                    endpoint = %id,
                    from = %t.from,
                    status = %t.to,
                    consecutive_failures = report.consecutive_failures,
                    "Replica marked unhealthy"
                ),
                _ => tracing::info!(
                    endpoint = %id,
                    from = %t.from,
                    status = %t.to,
                    "Replica marked healthy"
                ),
            }
            self.publish();
        } else if outcome == ProbeOutcome::Failure && report.status == HealthState::Healthy {
            tracing::warn!(
                endpoint = %id,
                consecutive_failures = report.consecutive_failures,
                threshold = self.settings.unhealthy_threshold,
                "Replica failing, still in rotation"
            );
        }

        Some(report)
    }

    /// Rebuild the healthy set from current state and swap it in.
    fn publish(&self) {
        let mut generation = self.publish.lock().unwrap_or_else(PoisonError::into_inner);

        let mut healthy: Vec<(u64, Endpoint<H>)> = self
            .entries
            .iter()
            .filter(|e| e.in_rotation())
            .map(|e| (e.registration, e.endpoint.clone()))
            .collect();
        healthy.sort_by_key(|(registration, _)| *registration);

        *generation += 1;
        let snapshot = HealthySnapshot::new(
            *generation,
            healthy.into_iter().map(|(_, endpoint)| endpoint).collect(),
        );
        tracing::debug!(
            generation = *generation,
            healthy = snapshot.len(),
            "Published healthy replica set"
        );
        self.healthy.store(Arc::new(snapshot));
    }
}

impl<H> fmt::Debug for ReplicaHealthRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaHealthRegistry")
            .field("registered", &self.entries.len())
            .field("healthy", &self.healthy.load().len())
            .field("settings", &self.settings)
            .finish()
    }
}
