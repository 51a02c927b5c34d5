//! Replica router command line.
//!
//! ```text
//! replica-router --config router.toml check
//! replica-router --config router.toml status
//! replica-router --config router.toml route findOrders --write-tx
//! replica-router --config router.toml watch
//! ```

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use replica_router::config::{load_config, watcher::ConfigWatcher, RouterConfig};
use replica_router::health::TcpConnectProbe;
use replica_router::lifecycle::{wait_for_signal, Shutdown};
use replica_router::observability::logging::init_logging;
use replica_router::routing::router::socket_endpoints;
use replica_router::{
    CallMetadata, ReadWriteRouter, RouterBuilder, RoutingContext, TargetClass, TransactionMode,
};

#[derive(Parser)]
#[command(name = "replica-router")]
#[command(about = "Read/write splitting router for a primary and its replicas", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration
    Check,
    /// Probe every replica once and print a JSON health report
    Status,
    /// Resolve one call and print the routing decision
    Route {
        /// Data-access method name, e.g. findOrders
        method: String,
        /// The call runs inside a read-write transaction
        #[arg(long, conflicts_with = "read_only_tx")]
        write_tx: bool,
        /// The call runs inside a read-only transaction
        #[arg(long)]
        read_only_tx: bool,
        /// Explicit target (primary or replica)
        #[arg(long)]
        hint: Option<TargetClass>,
    },
    /// Run the health monitor with config hot reload until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.observability);

    match cli.command {
        Commands::Check => {
            let enabled = config.replicas.iter().filter(|r| r.enabled).count();
            println!(
                "{}: ok ({} replicas, {} enabled, strategy {:?})",
                cli.config.display(),
                config.replicas.len(),
                enabled,
                config.load_balancing.strategy
            );
        }
        Commands::Status => {
            let router = build_router(&config)?;
            let summary = router.registry().run_cycle().await;
            let report = serde_json::json!({
                "primary": router.primary().id,
                "probed": summary.probed,
                "healthy": router.registry().healthy_snapshot().ids(),
                "replicas": router.health_status(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Route {
            method,
            write_tx,
            read_only_tx,
            hint,
        } => {
            let router = build_router(&config)?;
            router.registry().run_cycle().await;

            let transaction = if write_tx {
                TransactionMode::ReadWrite
            } else if read_only_tx {
                TransactionMode::ReadOnly
            } else {
                TransactionMode::None
            };
            let mut metadata = CallMetadata::new(&method).in_transaction(transaction);
            if let Some(hint) = hint {
                metadata = metadata.with_hint(hint);
            }

            let decision = router.route(&metadata, &RoutingContext::new());
            let output = serde_json::json!({
                "method": method,
                "target": decision.target,
                "source": decision.source,
                "endpoint": decision.endpoint_id,
                "address": decision.handle.to_string(),
                "served_by": decision.served_by.as_str(),
                "degraded": decision.degraded,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Watch => watch(cli.config, &config).await?,
    }

    Ok(())
}

fn build_router(
    config: &RouterConfig,
) -> Result<ReadWriteRouter<SocketAddr>, Box<dyn std::error::Error>> {
    let router = RouterBuilder::from_config(config, Arc::new(TcpConnectProbe))?.build()?;
    Ok(router)
}

async fn watch(path: PathBuf, config: &RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let router = build_router(config)?;
    let shutdown = Shutdown::new();
    let monitor = router.spawn_health_monitor(&shutdown);

    let (watcher, mut updates) = ConfigWatcher::new(&path);
    let _watcher = watcher.run()?;

    tracing::info!(
        primary = %router.primary().id,
        replicas = router.registry().len(),
        "Router running"
    );

    let signal = wait_for_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            Some(updated) = updates.recv() => apply_update(&router, &updated),
            res = &mut signal => {
                res?;
                break;
            }
        }
    }

    shutdown.trigger();
    if let Some(handle) = monitor {
        handle.await?;
    }
    tracing::info!(stats = ?router.stats(), "Router stopped");
    Ok(())
}

fn apply_update(router: &ReadWriteRouter<SocketAddr>, updated: &RouterConfig) {
    let (primary, replicas) = match socket_endpoints(updated) {
        Ok(endpoints) => endpoints,
        Err(e) => {
            tracing::error!(error = %e, "Ignoring configuration update");
            return;
        }
    };

    if primary.id != router.primary().id || primary.handle != router.primary().handle {
        tracing::warn!(
            current = %router.primary().id,
            requested = %primary.id,
            "Primary changes require a restart"
        );
    }

    if let Err(e) = router.reconcile_replicas(replicas) {
        tracing::error!(error = %e, "Replica reconciliation failed");
    }
}
