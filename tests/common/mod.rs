//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use replica_router::config::HealthCheckConfig;
use replica_router::{Endpoint, HealthProbe, ProbeError, ReadWriteRouter, RoutingContext};
use replica_router::{CallMetadata, RouteDecision};

/// Probe whose answer is scripted per endpoint id. Unknown ids answer "up".
#[derive(Default)]
pub struct ScriptedProbe {
    down: Mutex<HashMap<String, bool>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, id: &str, down: bool) {
        self.down.lock().unwrap().insert(id.to_string(), down);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<H: Send + Sync> HealthProbe<H> for ScriptedProbe {
    async fn check(&self, endpoint: &Endpoint<H>) -> Result<(), ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let down = self
            .down
            .lock()
            .unwrap()
            .get(endpoint.id.as_str())
            .copied()
            .unwrap_or(false);
        if down {
            Err(ProbeError::Unreachable(format!("{} scripted down", endpoint.id)))
        } else {
            Ok(())
        }
    }
}

/// Health settings tuned for tests: short timeout, fast interval.
pub fn fast_health_check() -> HealthCheckConfig {
    HealthCheckConfig {
        interval_ms: 20,
        timeout_ms: 200,
        ..HealthCheckConfig::default()
    }
}

/// Router with a primary and replicas `ids`, all probed once and healthy.
pub async fn router_with_replicas(
    probe: Arc<ScriptedProbe>,
    ids: &[&str],
) -> ReadWriteRouter<&'static str> {
    let mut builder = ReadWriteRouter::<&'static str>::builder(probe)
        .primary("primary", "db-primary")
        .health_check(fast_health_check());
    for id in ids {
        let handle: &'static str = Box::leak(format!("db-{}", id).into_boxed_str());
        builder = builder.replica(*id, handle);
    }
    let router = builder.build().unwrap();
    router.registry().run_cycle().await;
    router
}

/// Route a call outside of any transaction or forced scope.
pub fn route<H: Clone + Send + Sync + 'static>(
    router: &ReadWriteRouter<H>,
    method: &str,
) -> RouteDecision<H> {
    router.route(&CallMetadata::new(method), &RoutingContext::new())
}

/// Bind a TCP listener on an ephemeral port that accepts and drops connections.
pub async fn start_listener() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// In-memory log sink shared with a fmt subscriber.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Lines at `level` (e.g. "WARN") containing `message`.
    pub fn count(&self, level: &str, message: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.contains(level) && line.contains(message))
            .count()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a plain-text subscriber on this thread and return what it logged.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, LogBuffer) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs)
}
