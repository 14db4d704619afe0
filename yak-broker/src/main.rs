use std::sync::Arc;

use clap::Parser;
use yak_broker::http;
use yak_broker::state::AppState;
use yak_core::proto::BrokerAddr;
use yak_coord::{CoordinationStore, HttpCoordinationStore};
use yak_runtime::{HeartbeatReporter, LeaseManager, ReplicationCoordinator, ReplicationWorker};
use yak_storage::TopicStore;

/// YAK broker: serves the produce/consume/replicate HTTP surface for one
/// topic store, participating in leader election and replication against
/// its peers via a shared coordination store (spec.md §4).
#[derive(Parser, Debug)]
#[command(name = "yak-broker", version, about)]
struct Cli {
    /// This broker's unique id within the cluster.
    #[arg(long)]
    broker_id: u64,

    /// Port the HTTP surface binds to.
    #[arg(long)]
    port: u16,

    /// Host/IP the HTTP surface binds to.
    #[arg(long, default_value = "0.0.0.0")]
    bind_host: String,

    /// Host this broker advertises to peers and clients (may differ from
    /// `bind_host` behind NAT/containers).
    #[arg(long)]
    advertise_host: Option<String>,

    /// Coordination-store host.
    #[arg(long)]
    coord_host: String,

    /// Coordination-store port.
    #[arg(long)]
    coord_port: u16,

    /// Directory holding this broker's topic logs.
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Broker ids of other brokers in the cluster (repeatable).
    #[arg(long = "peer")]
    peers: Vec<u64>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    yak_core::logging::init(cli.verbose);

    let advertise = BrokerAddr {
        broker_id: cli.broker_id,
        host: cli.advertise_host.clone().unwrap_or_else(|| cli.bind_host.clone()),
        port: cli.port,
    };

    let storage = match TopicStore::open(&cli.data_dir) {
        Ok(s) => Arc::new(s),
        Err(err) => {
            tracing::error!(error = %err, "failed to open topic store");
            return std::process::ExitCode::FAILURE;
        }
    };

    let coord_store: Arc<dyn CoordinationStore> =
        match HttpCoordinationStore::new(&cli.coord_host, cli.coord_port) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                tracing::error!(error = %err, "failed to build coordination-store client");
                return std::process::ExitCode::FAILURE;
            }
        };

    let fatal = storage.fatal_guard();

    let (role_rx, lease_cancel, step_down) =
        LeaseManager::spawn(cli.broker_id, advertise.clone(), Arc::clone(&coord_store));
    let _heartbeat_cancel = HeartbeatReporter::spawn(
        cli.broker_id,
        advertise.clone(),
        Arc::clone(&coord_store),
        role_rx.clone(),
    );
    let _coordinator_cancel = ReplicationCoordinator::spawn(
        cli.broker_id,
        Arc::clone(&storage),
        Arc::clone(&coord_store),
        cli.peers.clone(),
        role_rx.clone(),
        step_down.clone(),
    );
    let _worker_cancel = ReplicationWorker::spawn(Arc::clone(&storage), role_rx.clone());

    let state = AppState {
        broker_id: cli.broker_id,
        advertise,
        storage,
        coord_store,
        configured_peers: cli.peers,
        role_rx,
    };
    let app = http::router(state);

    let listener = match tokio::net::TcpListener::bind((cli.bind_host.as_str(), cli.port)).await {
        Ok(l) => l,
        Err(err) => {
            tracing::error!(error = %err, "failed to bind HTTP listener");
            return std::process::ExitCode::FAILURE;
        }
    };
    tracing::info!(broker_id = cli.broker_id, port = cli.port, "yak-broker listening");

    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
            }
            _ = fatal.tripped() => {
                // spec.md §7: a broker that can't keep its own log
                // consistent steps down immediately rather than keep
                // serving requests (or, worse, keep acting as leader)
                // against a storage layer it no longer trusts.
                tracing::error!("repeated storage failure, stepping down and shutting down");
                step_down.force_unknown();
            }
        }
    };

    if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        tracing::error!(error = %err, "HTTP server exited with error");
        return std::process::ExitCode::FAILURE;
    }
    lease_cancel.cancel();
    if fatal.is_tripped() {
        tracing::error!("exiting after repeated storage failure");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}
