use serde::{Deserialize, Serialize};

use yak_core::LogEndEpoch;

/// `yak:lease` value (spec.md §6's coordination-store key table).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub holder_broker_id: u64,
    pub epoch: LogEndEpoch,
    pub expires_at_ms: i64,
}

/// `yak:brokers:<id>` value: one broker's advertised address and last
/// known liveness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerRegistryEntry {
    pub broker_id: u64,
    pub host: String,
    pub port: u16,
    pub last_heartbeat_at_ms: i64,
    pub last_seen_epoch: LogEndEpoch,
}

pub fn lease_key() -> String {
    "yak:lease".to_string()
}

pub fn broker_key(broker_id: u64) -> String {
    format!("yak:brokers:{broker_id}")
}
