//! End-to-end routing behaviour: reads, writes, transactions, forced scopes
//! and degradation.

use std::collections::HashMap;
use std::sync::Arc;

use replica_router::load_balancer::EndpointRole;
use replica_router::routing::DecisionSource;
use replica_router::{
    BalanceStrategy, CallMetadata, ReadWriteRouter, RoutingContext, TargetClass, TransactionMode,
};

mod common;
use common::{capture_logs, route, router_with_replicas, ScriptedProbe};

#[tokio::test]
async fn test_reads_alternate_between_healthy_replicas() {
    let router = router_with_replicas(ScriptedProbe::new(), &["replica-a", "replica-b"]).await;

    let picked: Vec<String> = (0..4)
        .map(|_| route(&router, "findOrders").endpoint_id.to_string())
        .collect();
    assert_eq!(picked, ["replica-a", "replica-b", "replica-a", "replica-b"]);
}

#[tokio::test]
async fn test_failing_replica_leaves_rotation_after_threshold() {
    let probe = ScriptedProbe::new();
    let router = router_with_replicas(probe.clone(), &["replica-a", "replica-b"]).await;

    probe.set_down("replica-a", true);
    for _ in 0..2 {
        router.registry().run_cycle().await;
    }
    // Two failures: still in rotation.
    assert_eq!(router.registry().healthy_snapshot().len(), 2);

    router.registry().run_cycle().await;
    assert_eq!(router.registry().healthy_snapshot().len(), 1);

    for _ in 0..5 {
        assert_eq!(route(&router, "getUser").endpoint_id.as_str(), "replica-b");
    }

    // One success brings it straight back.
    probe.set_down("replica-a", false);
    router.registry().run_cycle().await;
    assert_eq!(router.registry().healthy_snapshot().len(), 2);
}

#[tokio::test]
async fn test_read_named_call_in_write_transaction_goes_to_primary() {
    let router = router_with_replicas(ScriptedProbe::new(), &["replica-a"]).await;

    let meta = CallMetadata::new("findOrders").in_write_transaction();
    let decision = router.route(&meta, &RoutingContext::new());
    assert_eq!(decision.target, TargetClass::Primary);
    assert_eq!(decision.endpoint_id.as_str(), "primary");
    assert_eq!(decision.handle, "db-primary");
    assert_eq!(decision.source, DecisionSource::WriteTransaction);
    assert!(!decision.degraded);
}

#[tokio::test]
async fn test_read_degrades_to_primary_when_all_replicas_down() {
    let probe = ScriptedProbe::new();
    let router = router_with_replicas(probe.clone(), &["replica-a", "replica-b"]).await;

    probe.set_down("replica-a", true);
    probe.set_down("replica-b", true);
    for _ in 0..3 {
        router.registry().run_cycle().await;
    }
    assert!(router.registry().healthy_snapshot().is_empty());

    let (decision, logs) = capture_logs(|| route(&router, "listOrders"));
    assert_eq!(decision.target, TargetClass::Replica);
    assert_eq!(decision.served_by, EndpointRole::Primary);
    assert_eq!(decision.handle, "db-primary");
    assert!(decision.degraded);
    assert_eq!(router.stats().degraded_reads, 1);
    assert_eq!(logs.count("WARN", "Read degraded to primary"), 1);
}

#[tokio::test]
async fn test_unclassified_method_logs_warning() {
    let router = router_with_replicas(ScriptedProbe::new(), &["replica-a"]).await;

    let (decision, logs) = capture_logs(|| route(&router, "processQueue"));
    assert_eq!(decision.source, DecisionSource::Unclassified);
    assert_eq!(decision.endpoint_id.as_str(), "primary");
    assert_eq!(
        logs.count("WARN", "Unclassified operation, routing to primary"),
        1
    );
    assert!(logs.contents().contains("processQueue"));

    // Classified calls stay quiet at WARN.
    let (_, logs) = capture_logs(|| route(&router, "findOrders"));
    assert_eq!(logs.count("WARN", ""), 0);
}

#[tokio::test]
async fn test_write_transactions_never_reach_replicas() {
    let router = router_with_replicas(ScriptedProbe::new(), &["replica-a", "replica-b"]).await;
    let methods = [
        "selectAll", "getUser", "findOrders", "queryStats", "listItems", "countRows",
        "existsById", "checkQuota", "insertRow", "processQueue",
    ];

    for method in methods {
        let meta = CallMetadata::new(method).in_transaction(TransactionMode::ReadWrite);
        let decision = router.route(&meta, &RoutingContext::new());
        assert_eq!(decision.served_by, EndpointRole::Primary, "method {}", method);
    }
    assert_eq!(router.stats().replica_routes, 0);
}

#[tokio::test]
async fn test_read_only_transaction_uses_replicas() {
    let router = router_with_replicas(ScriptedProbe::new(), &["replica-a"]).await;
    let meta = CallMetadata::new("findOrders").in_transaction(TransactionMode::ReadOnly);
    let decision = router.route(&meta, &RoutingContext::new());
    assert_eq!(decision.endpoint_id.as_str(), "replica-a");
}

#[tokio::test]
async fn test_degradation_never_fails_without_replicas() {
    let router = ReadWriteRouter::<&'static str>::builder(ScriptedProbe::new())
        .primary("primary", "db-primary")
        .build()
        .unwrap();

    for _ in 0..10 {
        let decision = route(&router, "getUser");
        assert_eq!(decision.endpoint_id.as_str(), "primary");
        assert!(decision.degraded);
    }
    assert_eq!(router.stats().degraded_reads, 10);
}

#[tokio::test]
async fn test_forced_scope_is_restored_after_error() {
    let router = router_with_replicas(ScriptedProbe::new(), &["replica-a"]).await;
    let root = RoutingContext::new().forced(TargetClass::Replica, "reporting");

    let result: Result<(), String> =
        router.with_forced_routing(&root, TargetClass::Primary, "refresh", |ctx| {
            let decision = router.route(&CallMetadata::new("getUser"), ctx);
            assert_eq!(decision.endpoint_id.as_str(), "primary");
            Err("statement failed".to_string())
        });

    assert!(result.is_err());
    assert_eq!(root.current(), Some(TargetClass::Replica));
    let decision = router.route(&CallMetadata::new("updateUser"), &root);
    assert_eq!(decision.endpoint_id.as_str(), "replica-a");
}

#[tokio::test]
async fn test_concurrent_tasks_keep_their_own_scope() {
    let router = Arc::new(router_with_replicas(ScriptedProbe::new(), &["replica-a"]).await);
    let root = RoutingContext::new();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let router = router.clone();
        let ctx = if i % 2 == 0 {
            root.forced(TargetClass::Primary, "write path")
        } else {
            root.clone()
        };
        tasks.push(tokio::spawn(async move {
            tokio::task::yield_now().await;
            let decision = router.route(&CallMetadata::new("findOrders"), &ctx);
            (i, decision.endpoint_id.to_string())
        }));
    }

    for task in tasks {
        let (i, endpoint) = task.await.unwrap();
        let expected = if i % 2 == 0 { "primary" } else { "replica-a" };
        assert_eq!(endpoint, expected, "task {}", i);
    }
}

#[tokio::test]
async fn test_async_decorator_routes_once_per_call() {
    let router = router_with_replicas(ScriptedProbe::new(), &["replica-a"]).await;
    let ctx = RoutingContext::new();

    let rows = router
        .with_routing_async(&CallMetadata::new("countOrders"), &ctx, |decision| async move {
            tokio::task::yield_now().await;
            format!("{} rows from {}", 3, decision.handle)
        })
        .await;
    assert_eq!(rows, "3 rows from db-replica-a");

    let served = router
        .with_forced_routing_async(&ctx, TargetClass::Primary, "tx", |inner| {
            let router = &router;
            async move {
                router
                    .with_routing(&CallMetadata::new("countOrders"), &inner, |d| d.served_by)
            }
        })
        .await;
    assert_eq!(served, EndpointRole::Primary);
}

#[tokio::test]
async fn test_round_robin_visits_each_replica_once_per_round() {
    let ids = ["r1", "r2", "r3", "r4", "r5"];
    let router = router_with_replicas(ScriptedProbe::new(), &ids).await;

    for _ in 0..3 {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for _ in 0..ids.len() {
            *seen.entry(route(&router, "getItem").endpoint_id.to_string()).or_default() += 1;
        }
        assert_eq!(seen.len(), ids.len());
        assert!(seen.values().all(|&count| count == 1));
    }
}

#[tokio::test]
async fn test_weighted_strategy_follows_weights() {
    let router = ReadWriteRouter::<&'static str>::builder(ScriptedProbe::new())
        .primary("primary", "db-primary")
        .weighted_replica("heavy", "db-heavy", 3)
        .weighted_replica("light", "db-light", 1)
        .strategy(BalanceStrategy::WeightedRoundRobin)
        .build()
        .unwrap();
    router.registry().run_cycle().await;

    let mut seen: HashMap<String, usize> = HashMap::new();
    for _ in 0..8 {
        *seen.entry(route(&router, "getItem").endpoint_id.to_string()).or_default() += 1;
    }
    assert_eq!(seen["heavy"], 6);
    assert_eq!(seen["light"], 2);
}

#[tokio::test]
async fn test_explicit_hint_overrides_write_name() {
    let router = router_with_replicas(ScriptedProbe::new(), &["replica-a"]).await;
    let meta = CallMetadata::new("deleteExpired").with_hint(TargetClass::Replica);
    let decision = router.route(&meta, &RoutingContext::new());
    assert_eq!(decision.endpoint_id.as_str(), "replica-a");
    assert_eq!(decision.source, DecisionSource::ExplicitHint);
}
