use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::Error;

/// One line of the producer's local bookkeeping file: what was sent and
/// what offset the broker assigned it, so a restarted producer can tell
/// which of its pending sends already landed.
#[derive(Debug, Serialize, Deserialize)]
pub struct AckRecord {
    pub topic: String,
    pub message: Vec<u8>,
    pub offset: u64,
    pub hwm: u64,
}

/// Append-only JSON-lines journal of acknowledged sends, rooted at
/// `state_dir/<topic>.acks.jsonl`. Mirrors the broker's own on-disk log
/// format (spec.md §4.1) rather than inventing a new one.
pub struct AckJournal {
    path: PathBuf,
}

impl AckJournal {
    pub fn open(state_dir: &Path, topic: &str) -> Result<Self, Error> {
        std::fs::create_dir_all(state_dir)?;
        Ok(Self {
            path: state_dir.join(format!("{topic}.acks.jsonl")),
        })
    }

    pub async fn record(&self, ack: &AckRecord) -> Result<(), Error> {
        let mut line = serde_json::to_vec(ack).expect("AckRecord always serializes");
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.sync_data().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_one_line_per_ack() {
        let dir = tempfile::tempdir().unwrap();
        let journal = AckJournal::open(dir.path(), "orders").unwrap();
        journal
            .record(&AckRecord {
                topic: "orders".into(),
                message: b"a".to_vec(),
                offset: 0,
                hwm: 1,
            })
            .await
            .unwrap();
        journal
            .record(&AckRecord {
                topic: "orders".into(),
                message: b"b".to_vec(),
                offset: 1,
                hwm: 2,
            })
            .await
            .unwrap();

        let contents = std::fs::read_to_string(dir.path().join("orders.acks.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
