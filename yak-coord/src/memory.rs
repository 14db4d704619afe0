use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::store::CoordinationStore;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| at > Instant::now())
    }
}

/// A single-process coordination store, for integration tests and the
/// "no external cluster" demo path. Never expires eagerly; expiry is
/// checked lazily on access, same visible behavior a real TTL-backed
/// store gives a CAS caller.
#[derive(Default)]
pub struct InMemoryCoordinationStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).and_then(|e| {
            if e.is_live() {
                Some(e.value.clone())
            } else {
                None
            }
        }))
    }

    async fn cas(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool> {
        let current = self.entries.get(key).and_then(|e| {
            if e.is_live() {
                Some(e.value.clone())
            } else {
                None
            }
        });
        if current.as_deref() != expected {
            return Ok(false);
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value: new.to_string(),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cas_acquires_absent_key_and_rejects_stale_expectation() {
        let store = InMemoryCoordinationStore::new();
        assert!(store.cas("k", None, "v1").await.unwrap());
        assert!(!store.cas("k", None, "v2").await.unwrap());
        assert!(store.cas("k", Some("v1"), "v2").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn ttl_entries_expire() {
        let store = InMemoryCoordinationStore::new();
        store
            .set_with_ttl("k", "v", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = InMemoryCoordinationStore::new();
        store.cas("k", None, "v").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
