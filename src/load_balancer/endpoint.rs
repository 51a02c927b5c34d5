//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single database endpoint (the primary or one replica)
//! - Carry the opaque connection handle supplied by the connection provider
//! - Provide a cheap, stable identifier for logs, metrics and health state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable identifier of a database endpoint.
///
/// Backed by an `Arc<str>` so cloning on the request path never allocates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(Arc<str>);

impl EndpointId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EndpointId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl AsRef<str> for EndpointId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Role an endpoint plays in the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    /// The single writable endpoint of record.
    Primary,
    /// A read-only copy of the primary.
    Replica,
}

impl EndpointRole {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointRole::Primary => "primary",
            EndpointRole::Replica => "replica",
        }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single database endpoint.
///
/// `H` is the connection handle owned by the external connection provider
/// (a pool, a DSN, a socket address). The router never opens or closes it.
#[derive(Debug, Clone)]
pub struct Endpoint<H> {
    /// Unique identifier.
    pub id: EndpointId,
    /// Primary or replica.
    pub role: EndpointRole,
    /// Relative share of read traffic for weighted balancing (>= 1).
    pub weight: u32,
    /// Opaque connection handle.
    pub handle: H,
}

impl<H> Endpoint<H> {
    /// Create the primary endpoint.
    pub fn primary(id: impl Into<EndpointId>, handle: H) -> Self {
        Self {
            id: id.into(),
            role: EndpointRole::Primary,
            weight: 1,
            handle,
        }
    }

    /// Create a replica endpoint with weight 1.
    pub fn replica(id: impl Into<EndpointId>, handle: H) -> Self {
        Self {
            id: id.into(),
            role: EndpointRole::Replica,
            weight: 1,
            handle,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn is_primary(&self) -> bool {
        self.role == EndpointRole::Primary
    }
}
