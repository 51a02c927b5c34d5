//! Routing vocabulary shared by the resolver, the selector and the router.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::load_balancer::endpoint::{EndpointId, EndpointRole};

/// Endpoint class a call must be served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetClass {
    Primary,
    Replica,
}

impl TargetClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetClass::Primary => "primary",
            TargetClass::Replica => "replica",
        }
    }
}

impl fmt::Display for TargetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "master" | "write" => Ok(TargetClass::Primary),
            "replica" | "slave" | "read" => Ok(TargetClass::Replica),
            other => Err(format!("unknown target class '{}'", other)),
        }
    }
}

/// Transaction the call executes in, as reported by the interception layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Not inside a transaction.
    #[default]
    None,
    /// Inside a read-only transaction; replicas remain eligible.
    ReadOnly,
    /// Inside a transaction that may write.
    ReadWrite,
}

/// Metadata describing one data-access call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallMetadata<'a> {
    /// Per-call override supplied by the caller.
    pub explicit_hint: Option<TargetClass>,
    /// Enclosing transaction, if any.
    pub transaction: TransactionMode,
    /// Name of the data-access operation (e.g. `findOrders`).
    pub method_name: &'a str,
}

impl<'a> CallMetadata<'a> {
    pub fn new(method_name: &'a str) -> Self {
        Self {
            explicit_hint: None,
            transaction: TransactionMode::None,
            method_name,
        }
    }

    pub fn with_hint(mut self, hint: TargetClass) -> Self {
        self.explicit_hint = Some(hint);
        self
    }

    pub fn in_transaction(mut self, mode: TransactionMode) -> Self {
        self.transaction = mode;
        self
    }

    pub fn in_write_transaction(self) -> Self {
        self.in_transaction(TransactionMode::ReadWrite)
    }

    pub fn is_write_transaction(&self) -> bool {
        self.transaction == TransactionMode::ReadWrite
    }
}

/// Which rule of the policy produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    ExplicitHint,
    ForcedContext,
    WriteTransaction,
    ReadPrefix,
    WritePrefix,
    Unclassified,
}

/// Output of the routing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub target: TargetClass,
    pub source: DecisionSource,
}

/// Final routing decision handed back to the caller.
#[derive(Debug, Clone)]
pub struct RouteDecision<H> {
    /// Endpoint that serves the call.
    pub endpoint_id: EndpointId,
    /// Connection handle of that endpoint.
    pub handle: H,
    /// Class the policy resolved to.
    pub target: TargetClass,
    /// Rule that decided the class.
    pub source: DecisionSource,
    /// Role of the endpoint actually chosen.
    pub served_by: EndpointRole,
    /// True when a read was served by the primary for lack of healthy replicas.
    pub degraded: bool,
}
