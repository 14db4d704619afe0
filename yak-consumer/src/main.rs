mod client;
mod error;
mod state;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use yak_core::proto::BrokerAddr;

use crate::client::ConsumerClient;
use crate::state::{ConsumedEntry, ConsumerState};

/// YAK consumer: polls a topic by offset and persists consumed records and
/// its committed offset locally (spec.md §1, §6).
#[derive(Parser, Debug)]
#[command(name = "yak-consumer", version, about)]
struct Cli {
    #[arg(long)]
    broker_host: String,

    #[arg(long)]
    broker_port: u16,

    #[arg(long)]
    topic: String,

    #[arg(long, default_value = "./consumer-state")]
    state_dir: PathBuf,

    /// How often to poll for new records once caught up.
    #[arg(long, default_value_t = 500)]
    poll_interval: u64,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    yak_core::logging::init(cli.verbose);

    let state = match ConsumerState::open(&cli.state_dir, &cli.topic) {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "failed to open local consumer state");
            return std::process::ExitCode::FAILURE;
        }
    };
    let mut offset = match state.load_offset() {
        Ok(o) => o,
        Err(err) => {
            tracing::error!(error = %err, "failed to read committed offset");
            return std::process::ExitCode::FAILURE;
        }
    };

    let initial = BrokerAddr {
        broker_id: 0,
        host: cli.broker_host.clone(),
        port: cli.broker_port,
    };
    let mut client = match ConsumerClient::new(initial) {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(error = %err, "failed to build consumer client");
            return std::process::ExitCode::FAILURE;
        }
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let poll_interval = Duration::from_millis(cli.poll_interval);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                return std::process::ExitCode::SUCCESS;
            }
            result = client.consume(&cli.topic, offset) => {
                match result {
                    Ok(resp) if resp.messages.is_empty() => {
                        tokio::time::sleep(poll_interval).await;
                    }
                    Ok(resp) => {
                        let entries: Vec<ConsumedEntry> = resp
                            .messages
                            .iter()
                            .map(|m| ConsumedEntry {
                                topic: m.topic.clone(),
                                offset: m.offset,
                                message: m.message.clone(),
                            })
                            .collect();
                        if let Err(err) = state.append_records(&entries).await {
                            tracing::warn!(error = %err, "failed to persist consumed records");
                        }
                        offset = entries.last().map_or(offset, |e| e.offset + 1);
                        if let Err(err) = state.commit_offset(offset).await {
                            tracing::warn!(error = %err, "failed to persist committed offset");
                        }
                        tracing::debug!(offset, count = entries.len(), "consumed batch");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "poll failed, rediscovering leader");
                        if let Err(err) = client.rediscover_leader().await {
                            tracing::warn!(error = %err, "leader rediscovery failed");
                        }
                        tokio::time::sleep(poll_interval).await;
                    }
                }
            }
        }
    }
}
