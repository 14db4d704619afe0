use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use yak_core::record::{LogEndEpoch, Offset, Record, TopicLogMeta};
use yak_core::{Error, FatalGuard, Result};

use crate::file_log::FileTopicLog;

/// Multi-topic front door over a directory of [`FileTopicLog`]s. One
/// broker process owns exactly one `TopicStore` rooted at its configured
/// data directory.
pub struct TopicStore {
    data_dir: PathBuf,
    topics: DashMap<String, Arc<RwLock<FileTopicLog>>>,
    fatal: FatalGuard,
}

impl TopicStore {
    /// Opens `data_dir`, recovering any topic directories already present
    /// on disk so a restarted broker rejoins with its prior state intact.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|source| Error::Storage {
            topic: String::new(),
            source,
        })?;

        let topics = DashMap::new();
        if let Ok(entries) = fs::read_dir(&data_dir) {
            for entry in entries.flatten() {
                if !entry.path().is_dir() {
                    continue;
                }
                let Some(topic) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let log = FileTopicLog::open(&data_dir, &topic)?;
                topics.insert(topic, Arc::new(RwLock::new(log)));
            }
        }

        Ok(Self {
            data_dir,
            topics,
            fatal: FatalGuard::new(),
        })
    }

    /// Handle onto this store's consecutive-storage-failure streak
    /// (spec.md §7); `main` awaits [`FatalGuard::tripped`] on it.
    pub fn fatal_guard(&self) -> FatalGuard {
        self.fatal.clone()
    }

    /// Tracks every storage-layer `Result` against the fatal-failure
    /// streak: a success resets it, an I/O or decode error advances it
    /// (and logs once, the round that trips the threshold).
    fn track<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.fatal.record_success(),
            Err(Error::Storage { .. }) | Err(Error::Corrupt { .. }) => {
                if self.fatal.record_storage_failure() {
                    tracing::error!("repeated storage failure, this broker is unrecoverable");
                }
            }
            Err(_) => {}
        }
        result
    }

    fn topic_handle(&self, topic: &str) -> Result<Arc<RwLock<FileTopicLog>>> {
        self.topics
            .get(topic)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::NoSuchTopic {
                topic: topic.to_string(),
            })
    }

    /// Idempotent create. Returns `true` if this call created the topic,
    /// `false` if it already existed.
    pub async fn register_topic(&self, topic: &str) -> Result<bool> {
        if self.topics.contains_key(topic) {
            return Ok(false);
        }
        let log = self.track(FileTopicLog::open(&self.data_dir, topic))?;
        match self.topics.entry(topic.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(log)));
                Ok(true)
            }
        }
    }

    pub fn list_topics(&self) -> Vec<String> {
        self.topics.iter().map(|e| e.key().clone()).collect()
    }

    pub fn topic_exists(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub async fn append(&self, topic: &str, message: Vec<u8>, epoch: LogEndEpoch) -> Result<Offset> {
        let handle = self.topic_handle(topic)?;
        let mut log = handle.write().await;
        self.track(log.append(message, epoch))
    }

    pub async fn read(&self, topic: &str, from_offset: Offset, max_count: usize) -> Result<Vec<Record>> {
        let handle = self.topic_handle(topic)?;
        let log = handle.read().await;
        self.track(log.read(from_offset, max_count))
    }

    pub async fn truncate_to(&self, topic: &str, new_end: Offset) -> Result<()> {
        let handle = self.topic_handle(topic)?;
        let mut log = handle.write().await;
        self.track(log.truncate_to(new_end))
    }

    pub async fn set_hwm(&self, topic: &str, hwm: Offset) -> Result<()> {
        let handle = self.topic_handle(topic)?;
        let mut log = handle.write().await;
        self.track(log.set_hwm(hwm))
    }

    pub async fn meta(&self, topic: &str) -> Result<TopicLogMeta> {
        let handle = self.topic_handle(topic)?;
        let log = handle.read().await;
        Ok(log.meta())
    }

    pub async fn length(&self, topic: &str) -> Result<Offset> {
        Ok(self.meta(topic).await?.next_offset)
    }

    pub async fn get_hwm(&self, topic: &str) -> Result<Offset> {
        Ok(self.meta(topic).await?.hwm)
    }

    pub async fn last_epoch(&self, topic: &str) -> Result<LogEndEpoch> {
        Ok(self.meta(topic).await?.log_end_epoch)
    }

    pub async fn snapshot(&self) -> std::collections::BTreeMap<String, TopicLogMeta> {
        let mut out = std::collections::BTreeMap::new();
        for entry in self.topics.iter() {
            let log = entry.value().read().await;
            out.insert(entry.key().clone(), log.meta());
        }
        out
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TopicStore::open(dir.path()).unwrap();
        assert!(store.register_topic("orders").await.unwrap());
        assert!(!store.register_topic("orders").await.unwrap());
    }

    #[tokio::test]
    async fn append_and_read_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TopicStore::open(dir.path()).unwrap();
        store.register_topic("orders").await.unwrap();
        let offset = store.append("orders", b"hi".to_vec(), 1).await.unwrap();
        assert_eq!(offset, 0);
        let records = store.read("orders", 0, 10).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn unknown_topic_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = TopicStore::open(dir.path()).unwrap();
        let err = store.read("missing", 0, 10).await.unwrap_err();
        assert!(matches!(err, Error::NoSuchTopic { .. }));
    }

    #[tokio::test]
    async fn reopening_recovers_prior_topics() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TopicStore::open(dir.path()).unwrap();
            store.register_topic("orders").await.unwrap();
            store.append("orders", b"a".to_vec(), 1).await.unwrap();
            store.set_hwm("orders", 1).await.unwrap();
        }
        let store = TopicStore::open(dir.path()).unwrap();
        assert!(store.topic_exists("orders"));
        assert_eq!(store.get_hwm("orders").await.unwrap(), 1);
        assert_eq!(store.length("orders").await.unwrap(), 1);
    }
}
