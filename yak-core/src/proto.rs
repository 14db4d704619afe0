//! Wire types for the HTTP surface described in spec.md §6. Every type
//! here is plain serde data — no transport or framework concerns, so that
//! `yak-broker` (server), `yak-coord` (peer-to-peer replication client),
//! `yak-producer`, and `yak-consumer` can all share one definition of the
//! protocol.

use serde::{Deserialize, Serialize};

use crate::record::{LogEndEpoch, Offset};

/// `host:port` of a broker, as advertised in metadata responses and
/// redirects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerAddr {
    pub broker_id: u64,
    pub host: String,
    pub port: u16,
}

impl BrokerAddr {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// `POST /register_topic`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterTopicRequest {
    pub topic: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterTopicResponse {
    pub topic: String,
    pub created: bool,
}

/// `POST /produce`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProduceRequest {
    pub topic: String,
    pub message: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProduceResponse {
    pub offset: Offset,
    pub hwm: Offset,
}

/// `GET /consume?topic=T&offset=O`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsumedRecord {
    pub offset: Offset,
    pub topic: String,
    pub message: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsumeResponse {
    pub messages: Vec<ConsumedRecord>,
    pub hwm: Offset,
    pub total_available: Offset,
    pub requested_offset: Offset,
}

/// `POST /replicate/push`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplicaRecord {
    pub offset: Offset,
    pub message: Vec<u8>,
    pub epoch: LogEndEpoch,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendReplicaRequest {
    pub epoch: LogEndEpoch,
    pub topic: String,
    pub base_offset: Offset,
    pub records: Vec<ReplicaRecord>,
    /// The leader's current committed offset for this topic, carried on
    /// every push so the follower can advance its own hwm without a
    /// separate round trip (spec.md §4.3's "leader publishes hwm ...
    /// in the response to subsequent replica pushes").
    pub leader_hwm: Offset,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendReplicaResponse {
    pub ack_end_offset: Offset,
    pub hwm: Offset,
}

/// `GET /replicate/pull?topic=T&from=O&epoch=E`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PullReplicaResponse {
    pub base_offset: Offset,
    pub records: Vec<ReplicaRecord>,
    pub hwm: Offset,
    pub leader_epoch: LogEndEpoch,
}

/// `GET /metadata/leader`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderMetadata {
    pub broker_id: u64,
    pub host: String,
    pub port: u16,
    pub epoch: LogEndEpoch,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataLeaderResponse {
    pub leader: Option<LeaderMetadata>,
}

/// `GET /metadata/brokers`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub broker_id: u64,
    pub host: String,
    pub port: u16,
    pub last_heartbeat_at_ms: i64,
    pub last_seen_epoch: LogEndEpoch,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataBrokersResponse {
    pub brokers: Vec<BrokerInfo>,
}

/// `GET /health`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopicHealth {
    pub next_offset: Offset,
    pub hwm: Offset,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub role: String,
    pub epoch: LogEndEpoch,
    pub topics: std::collections::BTreeMap<String, TopicHealth>,
}

/// Machine-readable error kinds for the JSON error body returned
/// alongside non-2xx statuses (spec.md §6's error table).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    BadRequest,
    NoSuchTopic,
    TopicExists,
    EpochStale,
    RoleMismatch,
    OffsetMismatch,
    Unavailable,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub kind: ApiErrorKind,
    pub message: String,
}

/// `307` redirect body pointing a producer/consumer at the current
/// leader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedirectBody {
    pub leader: LeaderMetadata,
}

/// `416 OFFSET_MISMATCH` body (spec.md §4.4 point 4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OffsetMismatchBody {
    pub follower_end: Offset,
    pub follower_end_epoch: LogEndEpoch,
}
