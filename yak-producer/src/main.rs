mod client;
mod error;
mod journal;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncBufReadExt;
use yak_core::proto::BrokerAddr;

use crate::client::ProducerClient;
use crate::journal::{AckJournal, AckRecord};

/// YAK producer: sends one or more messages to a topic, following leader
/// redirects and retrying transient failures (spec.md §7).
#[derive(Parser, Debug)]
#[command(name = "yak-producer", version, about)]
struct Cli {
    #[arg(long)]
    broker_host: String,

    #[arg(long)]
    broker_port: u16,

    #[arg(long)]
    topic: String,

    /// Send one message given directly on the command line.
    #[arg(long, conflicts_with = "from_file")]
    message: Option<String>,

    /// Send each line of this file as a separate message.
    #[arg(long, conflicts_with = "message")]
    from_file: Option<PathBuf>,

    /// Directory for this producer's local ack bookkeeping.
    #[arg(long, default_value = "./producer-state")]
    state_dir: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    yak_core::logging::init(cli.verbose);

    let messages = match load_messages(&cli).await {
        Ok(m) => m,
        Err(err) => {
            tracing::error!(error = %err, "failed to read input");
            return std::process::ExitCode::FAILURE;
        }
    };

    let initial = BrokerAddr {
        broker_id: 0,
        host: cli.broker_host.clone(),
        port: cli.broker_port,
    };
    let mut client = match ProducerClient::new(initial) {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(error = %err, "failed to build producer client");
            return std::process::ExitCode::FAILURE;
        }
    };
    let journal = match AckJournal::open(&cli.state_dir, &cli.topic) {
        Ok(j) => j,
        Err(err) => {
            tracing::error!(error = %err, "failed to open ack journal");
            return std::process::ExitCode::FAILURE;
        }
    };

    for message in messages {
        let mut backoff = default_backoff();
        match client.produce(&cli.topic, message.clone(), &mut backoff).await {
            Ok(resp) => {
                tracing::info!(offset = resp.offset, hwm = resp.hwm, "produced");
                if let Err(err) = journal
                    .record(&AckRecord {
                        topic: cli.topic.clone(),
                        message,
                        offset: resp.offset,
                        hwm: resp.hwm,
                    })
                    .await
                {
                    tracing::warn!(error = %err, "failed to append ack journal entry");
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "giving up on message after exhausting retries");
                return std::process::ExitCode::FAILURE;
            }
        }
    }
    std::process::ExitCode::SUCCESS
}

fn default_backoff() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_interval: Duration::from_secs(5),
        max_elapsed_time: Some(Duration::from_secs(30)),
        ..Default::default()
    }
}

async fn load_messages(cli: &Cli) -> Result<Vec<Vec<u8>>, std::io::Error> {
    if let Some(text) = &cli.message {
        return Ok(vec![text.clone().into_bytes()]);
    }
    if let Some(path) = &cli.from_file {
        let file = tokio::fs::File::open(path).await?;
        let mut lines = tokio::io::BufReader::new(file).lines();
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await? {
            out.push(line.into_bytes());
        }
        return Ok(out);
    }
    Ok(Vec::new())
}
