//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Exactly one primary, unique endpoint ids, sane weights
//! - Validate value ranges (threshold, interval, timeout > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the topology and settings
//! - Runs at construction only; routing itself never fails

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{ClassificationConfig, HealthCheckConfig, RouterConfig};

/// Upper bound on an endpoint weight; keeps the weighted schedule small.
pub const MAX_WEIGHT: u32 = 1000;

/// A single semantic problem with the router configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no primary endpoint defined")]
    MissingPrimary,

    #[error("endpoint id must not be empty")]
    EmptyEndpointId,

    #[error("duplicate endpoint id '{0}'")]
    DuplicateEndpoint(String),

    #[error("endpoint '{id}' has weight {weight}, expected 1..={max}")]
    InvalidWeight { id: String, weight: u32, max: u32 },

    #[error("endpoint '{id}' has invalid address '{address}'")]
    InvalidAddress { id: String, address: String },

    #[error("health_check.unhealthy_threshold must be positive")]
    ZeroThreshold,

    #[error("health_check.interval_ms must be positive")]
    ZeroInterval,

    #[error("health_check.timeout_ms must be positive")]
    ZeroTimeout,

    #[error("health_check.max_concurrent_probes must be positive")]
    ZeroConcurrency,

    #[error("classification.{0} contains an empty prefix")]
    EmptyPrefix(&'static str),
}

/// Validate a topology given as `(id, weight)` pairs plus the shared settings.
pub fn validate_topology<'a>(
    primary: Option<&'a str>,
    replicas: impl IntoIterator<Item = (&'a str, u32)>,
    health: &HealthCheckConfig,
    classification: &ClassificationConfig,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    match primary {
        None => errors.push(ValidationError::MissingPrimary),
        Some(id) => check_id(id, &mut seen, &mut errors),
    }

    for (id, weight) in replicas {
        check_id(id, &mut seen, &mut errors);
        if weight == 0 || weight > MAX_WEIGHT {
            errors.push(ValidationError::InvalidWeight {
                id: id.to_string(),
                weight,
                max: MAX_WEIGHT,
            });
        }
    }

    if health.unhealthy_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold);
    }
    if health.interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval);
    }
    if health.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if health.max_concurrent_probes == 0 {
        errors.push(ValidationError::ZeroConcurrency);
    }

    if classification.read_prefixes.iter().any(|p| p.trim().is_empty()) {
        errors.push(ValidationError::EmptyPrefix("read_prefixes"));
    }
    if classification.write_prefixes.iter().any(|p| p.trim().is_empty()) {
        errors.push(ValidationError::EmptyPrefix("write_prefixes"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a configuration loaded from disk. Disabled replicas are skipped.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let enabled = || config.replicas.iter().filter(|r| r.enabled);

    let mut errors = validate_topology(
        config.primary.as_ref().map(|p| p.id.as_str()),
        enabled().map(|r| (r.id.as_str(), r.weight)),
        &config.health_check,
        &config.classification,
    )
    .err()
    .unwrap_or_default();

    for endpoint in config.primary.iter().chain(enabled()) {
        if endpoint.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                id: endpoint.id.clone(),
                address: endpoint.address.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_id<'a>(id: &'a str, seen: &mut HashSet<&'a str>, errors: &mut Vec<ValidationError>) {
    if id.trim().is_empty() {
        errors.push(ValidationError::EmptyEndpointId);
    } else if !seen.insert(id) {
        errors.push(ValidationError::DuplicateEndpoint(id.to_string()));
    }
}
