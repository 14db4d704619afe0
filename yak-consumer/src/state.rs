use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::Error;

/// One consumed record persisted locally, so a restarted consumer has a
/// durable copy of everything it has already seen.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConsumedEntry {
    pub topic: String,
    pub offset: u64,
    pub message: Vec<u8>,
}

/// Tracks a consumer's committed offset and consumed-record journal under
/// `state_dir`, mirroring the broker's own sidecar-file convention
/// (spec.md §4.1): a decimal offset file plus an append-only JSONL log.
pub struct ConsumerState {
    offset_path: PathBuf,
    records_path: PathBuf,
}

impl ConsumerState {
    pub fn open(state_dir: &Path, topic: &str) -> Result<Self, Error> {
        std::fs::create_dir_all(state_dir)?;
        Ok(Self {
            offset_path: state_dir.join(format!("{topic}.offset")),
            records_path: state_dir.join(format!("{topic}.records.jsonl")),
        })
    }

    pub fn load_offset(&self) -> Result<u64, Error> {
        if !self.offset_path.exists() {
            return Ok(0);
        }
        let contents = std::fs::read_to_string(&self.offset_path)?;
        Ok(contents.trim().parse().unwrap_or(0))
    }

    pub async fn commit_offset(&self, offset: u64) -> Result<(), Error> {
        tokio::fs::write(&self.offset_path, offset.to_string()).await?;
        Ok(())
    }

    pub async fn append_records(&self, entries: &[ConsumedEntry]) -> Result<(), Error> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.records_path)
            .await?;
        for entry in entries {
            let mut line = serde_json::to_vec(entry).expect("ConsumedEntry always serializes");
            line.push(b'\n');
            file.write_all(&line).await?;
        }
        file.sync_data().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_offset_file_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let state = ConsumerState::open(dir.path(), "t").unwrap();
        assert_eq!(state.load_offset().unwrap(), 0);
    }

    #[tokio::test]
    async fn offset_round_trips_through_commit() {
        let dir = tempfile::tempdir().unwrap();
        let state = ConsumerState::open(dir.path(), "t").unwrap();
        state.commit_offset(42).await.unwrap();
        assert_eq!(state.load_offset().unwrap(), 42);
    }

    #[tokio::test]
    async fn appended_records_persist_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let state = ConsumerState::open(dir.path(), "t").unwrap();
        state
            .append_records(&[ConsumedEntry {
                topic: "t".into(),
                offset: 0,
                message: b"hi".to_vec(),
            }])
            .await
            .unwrap();
        let contents = std::fs::read_to_string(dir.path().join("t.records.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
