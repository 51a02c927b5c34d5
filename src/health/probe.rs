//! Liveness probes.
//!
//! # Responsibilities
//! - Define the probe seam (`HealthProbe`) implemented per connection type
//! - Enforce the probe timeout
//! - Isolate probe panics so they read as a failed check
//!
//! # Design Decisions
//! - A probe reports `Result<(), ProbeError>`; the registry turns any error
//!   into a failed liveness check and never propagates it
//! - Each probe runs on its own Tokio task, so a panicking probe cannot take
//!   down the probing cycle
//! - A probe task never outlives the future waiting on it, so cancelling a
//!   cycle on shutdown stops its probes too

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::AbortHandle;
use tokio::time;

use crate::load_balancer::endpoint::Endpoint;

/// Reasons a liveness check failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe did not complete within the configured timeout.
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint could not be reached.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The endpoint answered but the liveness query did not return the expected result.
    #[error("liveness check rejected: {0}")]
    Rejected(String),

    /// The probe task panicked or was cancelled.
    #[error("probe task aborted: {0}")]
    Aborted(String),
}

/// A single lightweight liveness check against one endpoint
/// (the database equivalent of `SELECT 1`).
#[async_trait]
pub trait HealthProbe<H>: Send + Sync {
    async fn check(&self, endpoint: &Endpoint<H>) -> Result<(), ProbeError>;
}

/// Probe that only verifies a TCP connection can be opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProbe;

#[async_trait]
impl HealthProbe<SocketAddr> for TcpConnectProbe {
    async fn check(&self, endpoint: &Endpoint<SocketAddr>) -> Result<(), ProbeError> {
        TcpStream::connect(endpoint.handle)
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::Unreachable(format!("{}: {}", endpoint.handle, e)))
    }
}

/// Aborts the probe task once nothing waits for it anymore.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one probe on its own task, bounded by `timeout`.
///
/// Dropping the returned future cancels the probe task as well.
pub(crate) async fn run_probe<H>(
    probe: Arc<dyn HealthProbe<H>>,
    endpoint: Endpoint<H>,
    timeout: Duration,
) -> Result<(), ProbeError>
where
    H: Send + Sync + 'static,
{
    let task = tokio::spawn(async move { probe.check(&endpoint).await });
    let _abort = AbortOnDrop(task.abort_handle());

    match time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ProbeError::Aborted(join_error.to_string())),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}
