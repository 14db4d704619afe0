use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| at > Instant::now())
    }
}

/// The key-value store backing `yak-coordd`'s HTTP contract. Same
/// semantics as `yak_coord::InMemoryCoordinationStore`, kept as a
/// separate, dependency-free copy so this binary never needs to depend
/// on `yak-coord` (which exists to be the *client* of a store like this
/// one).
#[derive(Default)]
pub struct Store {
    entries: DashMap<String, Entry>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).and_then(|e| {
            if e.is_live() {
                Some(e.value.clone())
            } else {
                None
            }
        })
    }

    pub fn cas(&self, key: &str, expected: Option<&str>, new: &str) -> bool {
        let current = self.get(key);
        if current.as_deref() != expected {
            return false;
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value: new.to_string(),
                expires_at: None,
            },
        );
        true
    }

    pub fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops every entry whose TTL has lapsed. Run periodically so a
    /// forgotten heartbeat key doesn't linger forever in memory.
    pub fn sweep_expired(&self) {
        self.entries.retain(|_, e| e.is_live());
    }
}
