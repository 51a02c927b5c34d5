//! Metrics collection.
//!
//! # Responsibilities
//! - Define router metrics (routing decisions, degradations, probe results)
//! - Track per-endpoint health
//!
//! # Metrics
//! - `router_route_total` (counter): decisions by resolved target and serving role
//! - `router_read_degraded_total` (counter): reads served by the primary for lack of replicas
//! - `router_unclassified_total` (counter): calls whose method name matched no prefix
//! - `router_probe_total` (counter): probe results by endpoint and outcome
//! - `router_endpoint_health` (gauge): 1=healthy, 0=unknown, -1=unhealthy
//!
//! # Design Decisions
//! - Only the `metrics` facade is used; the host application installs a recorder
//! - Without a recorder every call here is a no-op

use crate::health::state::HealthState;
use crate::load_balancer::endpoint::{EndpointId, EndpointRole};
use crate::routing::types::TargetClass;

pub fn record_route(target: TargetClass, served_by: EndpointRole) {
    metrics::counter!(
        "router_route_total",
        "target" => target.as_str(),
        "served_by" => served_by.as_str()
    )
    .increment(1);
}

pub fn record_read_degraded() {
    metrics::counter!("router_read_degraded_total").increment(1);
}

pub fn record_unclassified() {
    metrics::counter!("router_unclassified_total").increment(1);
}

pub fn record_probe(endpoint: &EndpointId, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!(
        "router_probe_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_endpoint_health(endpoint: &EndpointId, state: HealthState) {
    let value = match state {
        HealthState::Healthy => 1.0,
        HealthState::Unknown => 0.0,
        HealthState::Unhealthy => -1.0,
    };
    metrics::gauge!("router_endpoint_health", "endpoint" => endpoint.to_string()).set(value);
}
