//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::BalanceStrategy;
use crate::routing::matcher::{DEFAULT_READ_PREFIXES, DEFAULT_WRITE_PREFIXES};

/// Root configuration for the read/write router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// The single writable endpoint.
    pub primary: Option<EndpointConfig>,

    /// Read-only replicas.
    pub replicas: Vec<EndpointConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Replica selection settings.
    pub load_balancing: LoadBalancingConfig,

    /// Method-name classification.
    pub classification: ClassificationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// One database endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Unique endpoint identifier.
    pub id: String,

    /// Endpoint address (e.g., "10.0.0.12:5432").
    pub address: String,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Disabled replicas are ignored when building the router.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_weight() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic health monitor.
    pub enabled: bool,

    /// Interval between probing cycles in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Number of consecutive failures before marking a replica unhealthy.
    pub unhealthy_threshold: u32,

    /// Maximum number of probes in flight during one cycle.
    pub max_concurrent_probes: usize,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            timeout_ms: 3_000,
            unhealthy_threshold: 3,
            max_concurrent_probes: 8,
        }
    }
}

/// Replica selection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LoadBalancingConfig {
    pub strategy: BalanceStrategy,
}

/// Method-name prefixes used when no stronger rule applies.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Prefixes routed to replicas.
    pub read_prefixes: Vec<String>,

    /// Prefixes routed to the primary.
    pub write_prefixes: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            read_prefixes: DEFAULT_READ_PREFIXES.iter().map(|p| p.to_string()).collect(),
            write_prefixes: DEFAULT_WRITE_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
