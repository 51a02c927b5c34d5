//! Routing policy.
//!
//! # Responsibilities
//! - Reduce call metadata and the active context to PRIMARY or REPLICA
//!
//! # Rules (first match wins)
//! 1. Explicit per-call hint
//! 2. Forced target of the enclosing `RoutingContext`
//! 3. Write transaction → PRIMARY (read-after-write consistency)
//! 4. Method-name prefix: read → REPLICA, write → PRIMARY
//! 5. Anything else → PRIMARY, logged as unclassified
//!
//! # Design Decisions
//! - Deterministic: same metadata and context always resolve the same way
//! - Never picks a concrete replica; that is the selector's job

use crate::config::ClassificationConfig;
use crate::observability::metrics;
use crate::routing::context::RoutingContext;
use crate::routing::matcher::{MethodClassifier, MethodKind, PrefixSet};
use crate::routing::types::{CallMetadata, DecisionSource, Resolution, TargetClass};

#[derive(Debug, Clone, Default)]
pub struct RoutingPolicyResolver {
    classifier: MethodClassifier,
}

impl RoutingPolicyResolver {
    pub fn new(classifier: MethodClassifier) -> Self {
        Self { classifier }
    }

    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self::new(MethodClassifier::new(
            PrefixSet::new(config.read_prefixes.iter().cloned()),
            PrefixSet::new(config.write_prefixes.iter().cloned()),
        ))
    }

    pub fn resolve(&self, metadata: &CallMetadata<'_>, context: &RoutingContext) -> TargetClass {
        self.resolve_detailed(metadata, context).target
    }

    /// Resolve and report which rule decided.
    pub fn resolve_detailed(
        &self,
        metadata: &CallMetadata<'_>,
        context: &RoutingContext,
    ) -> Resolution {
        if let Some(target) = metadata.explicit_hint {
            return Resolution {
                target,
                source: DecisionSource::ExplicitHint,
            };
        }

        if let Some(target) = context.current() {
            return Resolution {
                target,
                source: DecisionSource::ForcedContext,
            };
        }

        if metadata.is_write_transaction() {
            return Resolution {
                target: TargetClass::Primary,
                source: DecisionSource::WriteTransaction,
            };
        }

        match self.classifier.classify(metadata.method_name) {
            MethodKind::Read(_) => Resolution {
                target: TargetClass::Replica,
                source: DecisionSource::ReadPrefix,
            },
            MethodKind::Write(_) => Resolution {
                target: TargetClass::Primary,
                source: DecisionSource::WritePrefix,
            },
            MethodKind::Unclassified => {
                metrics::record_unclassified();
                tracing::warn!(
                    method = metadata.method_name,
                    "Unclassified operation, routing to primary"
                );
                Resolution {
                    target: TargetClass::Primary,
                    source: DecisionSource::Unclassified,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::types::TransactionMode;

    fn resolver() -> RoutingPolicyResolver {
        RoutingPolicyResolver::default()
    }

    #[test]
    fn test_method_name_heuristic() {
        let ctx = RoutingContext::new();
        let r = resolver();
        assert_eq!(r.resolve(&CallMetadata::new("findOrders"), &ctx), TargetClass::Replica);
        assert_eq!(r.resolve(&CallMetadata::new("LISTUSERS"), &ctx), TargetClass::Replica);
        assert_eq!(r.resolve(&CallMetadata::new("saveOrder"), &ctx), TargetClass::Primary);
        assert_eq!(r.resolve(&CallMetadata::new("removeItem"), &ctx), TargetClass::Primary);
    }

    #[test]
    fn test_unclassified_defaults_to_primary() {
        let resolution =
            resolver().resolve_detailed(&CallMetadata::new("reconcile"), &RoutingContext::new());
        assert_eq!(resolution.target, TargetClass::Primary);
        assert_eq!(resolution.source, DecisionSource::Unclassified);
    }

    #[test]
    fn test_write_transaction_beats_read_prefix() {
        let meta = CallMetadata::new("findOrders").in_write_transaction();
        let resolution = resolver().resolve_detailed(&meta, &RoutingContext::new());
        assert_eq!(resolution.target, TargetClass::Primary);
        assert_eq!(resolution.source, DecisionSource::WriteTransaction);
    }

    #[test]
    fn test_read_only_transaction_keeps_replica() {
        let meta = CallMetadata::new("findOrders").in_transaction(TransactionMode::ReadOnly);
        assert_eq!(resolver().resolve(&meta, &RoutingContext::new()), TargetClass::Replica);
    }

    #[test]
    fn test_context_beats_transaction_and_name() {
        let ctx = RoutingContext::new().forced(TargetClass::Replica, "reporting");
        let meta = CallMetadata::new("updateStats").in_write_transaction();
        let resolution = resolver().resolve_detailed(&meta, &ctx);
        assert_eq!(resolution.target, TargetClass::Replica);
        assert_eq!(resolution.source, DecisionSource::ForcedContext);
    }

    #[test]
    fn test_hint_beats_everything() {
        let ctx = RoutingContext::new().forced(TargetClass::Primary, "tx");
        let meta = CallMetadata::new("deleteAll")
            .in_write_transaction()
            .with_hint(TargetClass::Replica);
        let resolution = resolver().resolve_detailed(&meta, &ctx);
        assert_eq!(resolution.target, TargetClass::Replica);
        assert_eq!(resolution.source, DecisionSource::ExplicitHint);
    }

    #[test]
    fn test_write_transaction_always_primary_without_hint_or_force() {
        let names = ["findA", "getB", "selectC", "listD", "countE", "insertF", "xyz", ""];
        for name in names {
            let meta = CallMetadata::new(name).in_write_transaction();
            assert_eq!(
                resolver().resolve(&meta, &RoutingContext::new()),
                TargetClass::Primary,
                "method {:?}",
                name
            );
        }
    }

    #[test]
    fn test_custom_prefixes_from_config() {
        let config = ClassificationConfig {
            read_prefixes: vec!["fetch".into()],
            write_prefixes: vec!["put".into()],
        };
        let r = RoutingPolicyResolver::from_config(&config);
        let ctx = RoutingContext::new();
        assert_eq!(r.resolve(&CallMetadata::new("fetchUser"), &ctx), TargetClass::Replica);
        assert_eq!(
            r.resolve_detailed(&CallMetadata::new("findUser"), &ctx).source,
            DecisionSource::Unclassified
        );
    }
}
