//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered replica
//! - Stop promptly when shutdown is signalled

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::registry::ReplicaHealthRegistry;

pub struct HealthMonitor<H> {
    registry: Arc<ReplicaHealthRegistry<H>>,
    config: HealthCheckConfig,
}

impl<H> HealthMonitor<H>
where
    H: Clone + Send + Sync + 'static,
{
    pub fn new(registry: Arc<ReplicaHealthRegistry<H>>, config: HealthCheckConfig) -> Self {
        Self { registry, config }
    }

    /// Probe loop. The first cycle runs immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval_ms = self.config.interval_ms,
            timeout_ms = self.config.timeout_ms,
            threshold = self.config.unhealthy_threshold,
            replicas = self.registry.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_millis(self.config.interval_ms.max(1)));
        // A slow cycle must not trigger a burst of catch-up cycles.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.registry.run_cycle() => {}
                        _ = shutdown.recv() => {
                            tracing::info!("Health monitor stopped during a cycle");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::{HealthProbe, ProbeError};
    use crate::health::state::HealthState;
    use crate::load_balancer::endpoint::Endpoint;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl HealthProbe<()> for Counting {
        async fn check(&self, _endpoint: &Endpoint<()>) -> Result<(), ProbeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config(enabled: bool) -> HealthCheckConfig {
        HealthCheckConfig {
            enabled,
            interval_ms: 20,
            ..HealthCheckConfig::default()
        }
    }

    #[tokio::test]
    async fn test_monitor_probes_and_stops_on_shutdown() {
        let probe = Arc::new(Counting::default());
        let registry = Arc::new(ReplicaHealthRegistry::new(probe.clone(), &config(true)));
        registry.register(Endpoint::replica("r1", ())).unwrap();

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(HealthMonitor::new(registry.clone(), config(true)).run(rx));

        time::sleep(Duration::from_millis(90)).await;
        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();

        assert!(probe.0.load(Ordering::SeqCst) >= 2);
        assert_eq!(
            registry.report(&"r1".into()).unwrap().status,
            HealthState::Healthy
        );

        let probes_at_stop = probe.0.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(probe.0.load(Ordering::SeqCst), probes_at_stop);
    }

    #[tokio::test]
    async fn test_disabled_monitor_returns_immediately() {
        let probe = Arc::new(Counting::default());
        let registry = Arc::new(ReplicaHealthRegistry::new(probe.clone(), &config(false)));
        registry.register(Endpoint::replica("r1", ())).unwrap();

        let (_tx, rx) = broadcast::channel(1);
        time::timeout(
            Duration::from_secs(1),
            HealthMonitor::new(registry, config(false)).run(rx),
        )
        .await
        .unwrap();
        assert_eq!(probe.0.load(Ordering::SeqCst), 0);
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Never answers; records when its in-flight check is torn down.
    struct Stuck(Arc<AtomicBool>);

    #[async_trait]
    impl HealthProbe<()> for Stuck {
        async fn check(&self, _endpoint: &Endpoint<()>) -> Result<(), ProbeError> {
            let _guard = SetOnDrop(self.0.clone());
            time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_mid_cycle_cancels_probe_tasks() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let config = HealthCheckConfig {
            timeout_ms: 60_000,
            ..config(true)
        };
        let registry = Arc::new(ReplicaHealthRegistry::new(
            Arc::new(Stuck(cancelled.clone())),
            &config,
        ));
        registry.register(Endpoint::replica("r1", ())).unwrap();

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(HealthMonitor::new(registry.clone(), config).run(rx));

        time::sleep(Duration::from_millis(50)).await;
        assert!(!cancelled.load(Ordering::SeqCst));

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();

        time::sleep(Duration::from_millis(50)).await;
        assert!(cancelled.load(Ordering::SeqCst));
        assert_eq!(
            registry.report(&"r1".into()).unwrap().status,
            HealthState::Unknown
        );
    }
}
