use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// The four primitives spec.md §9's design note requires of an external
/// coordination store: read, atomic compare-and-set, set-with-expiry, and
/// delete. Deliberately narrow so any store with these primitives (etcd,
/// Consul, ZooKeeper, or the in-memory/HTTP reference implementations
/// here) is a drop-in.
///
/// Values are opaque strings; callers (`yak-runtime`) serialize their own
/// JSON payloads ([`crate::types::LeaseRecord`],
/// [`crate::types::BrokerRegistryEntry`]) on top.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Current value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Atomically: if the current value for `key` equals `expected`
    /// (`None` meaning "absent"), set it to `new` and return `true`;
    /// otherwise leave it untouched and return `false`. This is the sole
    /// primitive the LeaseManager uses for both acquisition (`expected:
    /// None` or a stale lease) and renewal (`expected: Some(current)`).
    async fn cas(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool>;

    /// Unconditionally sets `key`, expiring it after `ttl` if not
    /// refreshed. Used by `HeartbeatReporter` for liveness registration.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Removes `key`, used on clean leader shutdown to release the lease
    /// early rather than waiting out its TTL.
    async fn delete(&self, key: &str) -> Result<()>;
}
