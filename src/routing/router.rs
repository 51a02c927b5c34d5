//! Read/write router facade.
//!
//! # Responsibilities
//! - Wire the policy resolver, the endpoint selector and the health registry
//! - Hand every data-access call a concrete endpoint handle
//! - Manage the replica set at runtime and spawn the health monitor
//!
//! # Design Decisions
//! - Constructed explicitly through `RouterBuilder`; no global state
//! - `route` is synchronous and infallible: it never does I/O and never blocks
//! - Configuration problems surface once, at `build`, with every error listed

use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::validation::{validate_config, validate_topology};
use crate::config::{
    ClassificationConfig, ConfigError, EndpointConfig, HealthCheckConfig, RouterConfig,
    ValidationError,
};
use crate::health::active::HealthMonitor;
use crate::health::probe::HealthProbe;
use crate::health::registry::{RegistryError, ReplicaHealthRegistry};
use crate::health::state::HealthReport;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{
    BalanceStrategy, Endpoint, EndpointId, EndpointRole, EndpointSelector,
};
use crate::observability::metrics;
use crate::routing::context::RoutingContext;
use crate::routing::policy::RoutingPolicyResolver;
use crate::routing::types::{CallMetadata, DecisionSource, RouteDecision, TargetClass};

/// Point-in-time routing counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Calls served by the primary, degraded reads included.
    pub primary_routes: u64,
    /// Calls served by a replica.
    pub replica_routes: u64,
    /// Reads served by the primary because no replica was healthy.
    pub degraded_reads: u64,
    /// Calls whose method name matched no prefix.
    pub unclassified: u64,
}

/// Outcome of [`ReadWriteRouter::reconcile_replicas`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: Vec<EndpointId>,
    pub removed: Vec<EndpointId>,
}

impl ReconcileSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Clears the running flag when the monitor task ends or is aborted.
struct MonitorSlot(Arc<AtomicBool>);

impl Drop for MonitorSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct RouteCounters {
    primary: AtomicU64,
    replica: AtomicU64,
    unclassified: AtomicU64,
}

/// Routes data-access calls to the primary or to a healthy replica.
#[derive(Debug)]
pub struct ReadWriteRouter<H> {
    resolver: RoutingPolicyResolver,
    selector: EndpointSelector<H>,
    registry: Arc<ReplicaHealthRegistry<H>>,
    health_check: HealthCheckConfig,
    counters: RouteCounters,
    /// Set while a spawned health monitor is alive.
    monitor_running: Arc<AtomicBool>,
}

impl<H> ReadWriteRouter<H>
where
    H: Clone + Send + Sync + 'static,
{
    pub fn builder(probe: Arc<dyn HealthProbe<H>>) -> RouterBuilder<H> {
        RouterBuilder::new(probe)
    }

    /// Decide which endpoint serves one call.
    pub fn route(&self, metadata: &CallMetadata<'_>, context: &RoutingContext) -> RouteDecision<H> {
        let resolution = self.resolver.resolve_detailed(metadata, context);
        let selection = self.selector.select(resolution.target);

        match selection.served_by {
            EndpointRole::Primary => self.counters.primary.fetch_add(1, Ordering::Relaxed),
            EndpointRole::Replica => self.counters.replica.fetch_add(1, Ordering::Relaxed),
        };
        if resolution.source == DecisionSource::Unclassified {
            self.counters.unclassified.fetch_add(1, Ordering::Relaxed);
        }
        metrics::record_route(resolution.target, selection.served_by);

        tracing::debug!(
            method = metadata.method_name,
            class = %resolution.target,
            source = ?resolution.source,
            endpoint = %selection.endpoint_id,
            degraded = selection.degraded,
            "Routed call"
        );

        RouteDecision {
            endpoint_id: selection.endpoint_id,
            handle: selection.handle,
            target: resolution.target,
            source: resolution.source,
            served_by: selection.served_by,
            degraded: selection.degraded,
        }
    }

    /// Route one call and run it against the chosen endpoint.
    pub fn with_routing<R>(
        &self,
        metadata: &CallMetadata<'_>,
        context: &RoutingContext,
        f: impl FnOnce(&RouteDecision<H>) -> R,
    ) -> R {
        let decision = self.route(metadata, context);
        f(&decision)
    }

    /// Async form of [`with_routing`](Self::with_routing). The decision is
    /// taken before the call starts and does not change while it runs.
    pub async fn with_routing_async<F, Fut, R>(
        &self,
        metadata: &CallMetadata<'_>,
        context: &RoutingContext,
        f: F,
    ) -> R
    where
        F: FnOnce(RouteDecision<H>) -> Fut,
        Fut: Future<Output = R>,
    {
        let decision = self.route(metadata, context);
        f(decision).await
    }

    /// Run `f` with every nested call forced to `target`.
    pub fn with_forced_routing<R>(
        &self,
        context: &RoutingContext,
        target: TargetClass,
        reason: &'static str,
        f: impl FnOnce(&RoutingContext) -> R,
    ) -> R {
        tracing::debug!(class = %target, reason, depth = context.depth() + 1, "Forcing routing");
        context.with_forced(target, reason, f)
    }

    pub async fn with_forced_routing_async<F, Fut, R>(
        &self,
        context: &RoutingContext,
        target: TargetClass,
        reason: &'static str,
        f: F,
    ) -> R
    where
        F: FnOnce(RoutingContext) -> Fut,
        Fut: Future<Output = R>,
    {
        tracing::debug!(class = %target, reason, depth = context.depth() + 1, "Forcing routing");
        context.with_forced_async(target, reason, f).await
    }

    /// Health of every registered replica, in registration order.
    pub fn health_status(&self) -> Vec<HealthReport> {
        self.registry.health_status()
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            primary_routes: self.counters.primary.load(Ordering::Relaxed),
            replica_routes: self.counters.replica.load(Ordering::Relaxed),
            degraded_reads: self.selector.degraded_reads(),
            unclassified: self.counters.unclassified.load(Ordering::Relaxed),
        }
    }

    /// Add a replica at runtime. It serves reads after its first successful probe.
    pub fn add_replica(&self, endpoint: Endpoint<H>) -> Result<(), RegistryError> {
        if endpoint.id == self.selector.primary().id {
            return Err(RegistryError::Duplicate(endpoint.id));
        }
        self.registry.register(endpoint)
    }

    /// Remove a replica at runtime. In-flight calls holding its handle finish normally.
    pub fn remove_replica(&self, id: &EndpointId) -> Result<(), RegistryError> {
        self.registry.unregister(id)
    }

    /// Take a replica out of read rotation. It keeps being probed.
    pub fn drain_replica(&self, id: &EndpointId) -> Result<HealthReport, RegistryError> {
        self.registry.set_drained(id, true)
    }

    /// Return a drained replica to rotation. It serves reads again at once if healthy.
    pub fn undrain_replica(&self, id: &EndpointId) -> Result<HealthReport, RegistryError> {
        self.registry.set_drained(id, false)
    }

    pub fn primary(&self) -> &Endpoint<H> {
        self.selector.primary()
    }

    pub fn registry(&self) -> &Arc<ReplicaHealthRegistry<H>> {
        &self.registry
    }

    /// Start the periodic health monitor.
    ///
    /// Returns `None` when health checks are disabled or a monitor is
    /// already running for this router.
    pub fn spawn_health_monitor(&self, shutdown: &Shutdown) -> Option<JoinHandle<()>> {
        if !self.health_check.enabled {
            tracing::info!("Active health checks disabled, monitor not started");
            return None;
        }
        if self
            .monitor_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Health monitor already running, not starting another");
            return None;
        }

        let running = MonitorSlot(self.monitor_running.clone());
        let monitor = HealthMonitor::new(self.registry.clone(), self.health_check.clone());
        let shutdown = shutdown.subscribe();
        Some(tokio::spawn(async move {
            let _running = running;
            monitor.run(shutdown).await;
        }))
    }
}

impl<H> ReadWriteRouter<H>
where
    H: Clone + PartialEq + Send + Sync + 'static,
{
    /// Bring the replica set in line with `desired`.
    ///
    /// Replicas whose handle or weight changed are re-registered and start
    /// over as UNKNOWN. Nothing is applied if `desired` is invalid.
    pub fn reconcile_replicas(
        &self,
        desired: Vec<Endpoint<H>>,
    ) -> Result<ReconcileSummary, ConfigError> {
        validate_topology(
            Some(self.primary().id.as_str()),
            desired.iter().map(|e| (e.id.as_str(), e.weight)),
            &self.health_check,
            &ClassificationConfig::default(),
        )?;

        let current = self.registry.endpoints();
        let mut summary = ReconcileSummary::default();

        for existing in &current {
            let keep = desired.iter().any(|d| {
                d.id == existing.id && d.handle == existing.handle && d.weight == existing.weight
            });
            if !keep {
                self.registry.unregister(&existing.id)?;
                summary.removed.push(existing.id.clone());
            }
        }

        for endpoint in desired {
            if !self.registry.contains(&endpoint.id) {
                let id = endpoint.id.clone();
                self.registry.register(endpoint)?;
                summary.added.push(id);
            }
        }

        if !summary.is_empty() {
            tracing::info!(
                added = summary.added.len(),
                removed = summary.removed.len(),
                replicas = self.registry.len(),
                "Replica set reconciled"
            );
        }
        Ok(summary)
    }
}

/// Builder for [`ReadWriteRouter`].
pub struct RouterBuilder<H> {
    probe: Arc<dyn HealthProbe<H>>,
    primary: Option<Endpoint<H>>,
    replicas: Vec<Endpoint<H>>,
    health_check: HealthCheckConfig,
    strategy: BalanceStrategy,
    classification: ClassificationConfig,
}

impl<H> RouterBuilder<H>
where
    H: Clone + Send + Sync + 'static,
{
    pub fn new(probe: Arc<dyn HealthProbe<H>>) -> Self {
        Self {
            probe,
            primary: None,
            replicas: Vec::new(),
            health_check: HealthCheckConfig::default(),
            strategy: BalanceStrategy::default(),
            classification: ClassificationConfig::default(),
        }
    }

    pub fn primary(mut self, id: impl Into<EndpointId>, handle: H) -> Self {
        self.primary = Some(Endpoint::primary(id, handle));
        self
    }

    pub fn replica(self, id: impl Into<EndpointId>, handle: H) -> Self {
        self.weighted_replica(id, handle, 1)
    }

    pub fn weighted_replica(mut self, id: impl Into<EndpointId>, handle: H, weight: u32) -> Self {
        self.replicas
            .push(Endpoint::replica(id, handle).with_weight(weight));
        self
    }

    pub fn health_check(mut self, config: HealthCheckConfig) -> Self {
        self.health_check = config;
        self
    }

    pub fn strategy(mut self, strategy: BalanceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn classification(mut self, config: ClassificationConfig) -> Self {
        self.classification = config;
        self
    }

    /// Validate the topology and assemble the router.
    ///
    /// Replicas start UNKNOWN; reads go to the primary until the first
    /// probing cycle marks one healthy.
    pub fn build(self) -> Result<ReadWriteRouter<H>, ConfigError> {
        validate_topology(
            self.primary.as_ref().map(|p| p.id.as_str()),
            self.replicas.iter().map(|r| (r.id.as_str(), r.weight)),
            &self.health_check,
            &self.classification,
        )?;
        let primary = self
            .primary
            .ok_or_else(|| ConfigError::Validation(vec![ValidationError::MissingPrimary]))?;

        let registry = Arc::new(ReplicaHealthRegistry::new(self.probe, &self.health_check));
        for replica in self.replicas {
            registry.register(replica)?;
        }

        tracing::info!(
            primary = %primary.id,
            replicas = registry.len(),
            strategy = ?self.strategy,
            "Router built"
        );

        Ok(ReadWriteRouter {
            resolver: RoutingPolicyResolver::from_config(&self.classification),
            selector: EndpointSelector::new(primary, registry.clone(), self.strategy),
            registry,
            health_check: self.health_check,
            counters: RouteCounters::default(),
            monitor_running: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl RouterBuilder<SocketAddr> {
    /// Builder pre-filled from a loaded configuration. Disabled replicas are skipped.
    pub fn from_config(
        config: &RouterConfig,
        probe: Arc<dyn HealthProbe<SocketAddr>>,
    ) -> Result<Self, ConfigError> {
        let (primary, replicas) = socket_endpoints(config)?;
        Ok(Self {
            probe,
            primary: Some(primary),
            replicas,
            health_check: config.health_check.clone(),
            strategy: config.load_balancing.strategy,
            classification: config.classification.clone(),
        })
    }
}

/// Validate `config` and turn its endpoints into socket-address endpoints.
pub fn socket_endpoints(
    config: &RouterConfig,
) -> Result<(Endpoint<SocketAddr>, Vec<Endpoint<SocketAddr>>), ConfigError> {
    validate_config(config)?;

    let primary = config
        .primary
        .as_ref()
        .ok_or_else(|| ConfigError::Validation(vec![ValidationError::MissingPrimary]))?;
    let primary = Endpoint::primary(primary.id.as_str(), parse_address(primary)?);

    let replicas = config
        .replicas
        .iter()
        .filter(|r| r.enabled)
        .map(|r| Ok(Endpoint::replica(r.id.as_str(), parse_address(r)?).with_weight(r.weight)))
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok((primary, replicas))
}

fn parse_address(endpoint: &EndpointConfig) -> Result<SocketAddr, ConfigError> {
    endpoint.address.parse().map_err(|_| {
        ConfigError::Validation(vec![ValidationError::InvalidAddress {
            id: endpoint.id.clone(),
            address: endpoint.address.clone(),
        }])
    })
}
