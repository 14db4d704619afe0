use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;

use yak_coordd::http::{self, AppState};
use yak_coordd::store::Store;

/// Reference coordination store: a single process implementing the
/// get/cas/set-with-ttl/delete contract `yak_coord::HttpCoordinationStore`
/// speaks, for running the YAK broker cluster without an externally
/// operated etcd/Consul/ZooKeeper.
#[derive(Parser, Debug)]
#[command(name = "yak-coordd", version, about)]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = yak_core::config::DEFAULT_COORD_PORT)]
    port: u16,

    /// How often to sweep expired keys out of memory.
    #[arg(long, default_value = "5")]
    sweep_interval_secs: u64,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    yak_core::logging::init(cli.verbose);

    let store = Arc::new(Store::new());
    let sweep_store = Arc::clone(&store);
    let sweep_interval = Duration::from_secs(cli.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sweep_store.sweep_expired();
        }
    });

    let app = http::router(AppState { store }).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .expect("invalid bind address");
    info!(%addr, "yak-coordd listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind coordination store listener");
    axum::serve(listener, app)
        .await
        .expect("coordination store server exited unexpectedly");
}
