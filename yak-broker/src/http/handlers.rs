use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use yak_core::proto::{
    AppendReplicaRequest, AppendReplicaResponse, BrokerInfo, ConsumeResponse,
    ConsumedRecord, HealthResponse, LeaderMetadata, MetadataBrokersResponse, MetadataLeaderResponse,
    OffsetMismatchBody, ProduceRequest, ProduceResponse, PullReplicaResponse, RedirectBody,
    RegisterTopicRequest, RegisterTopicResponse, ReplicaRecord, TopicHealth,
};
use yak_coord::types::broker_key;
use yak_coord::CoordinationStore;
use yak_runtime::Role;

use crate::http::error::ApiError;
use crate::state::AppState;

const MAX_CONSUME_BATCH: usize = 500;

fn require_leader(state: &AppState) -> Result<u64, ApiError> {
    let snap = state.role();
    match snap.role {
        Role::Leader => Ok(snap.epoch),
        Role::Follower => Err(redirect_or_unavailable(snap.known_leader)),
        Role::Unknown => Err(ApiError::unavailable("no leader known")),
    }
}

fn redirect_or_unavailable(known_leader: Option<LeaderMetadata>) -> ApiError {
    match known_leader {
        Some(leader) if !leader.host.is_empty() => {
            // Not a strict HTTP 307 here since that requires a Location
            // header dance across JSON bodies; producers/consumers are
            // expected to parse this body and retry against `leader`
            // themselves, matching spec.md §7's "producers observing
            // 307 follow the redirect" behavior at the body level.
            ApiError::role_mismatch_redirect(leader)
        }
        _ => ApiError::unavailable("no leader known"),
    }
}

pub async fn register_topic(
    State(state): State<AppState>,
    Json(req): Json<RegisterTopicRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_leader(&state)?;
    let created = state.storage.register_topic(&req.topic).await?;
    if !created {
        return Err(yak_core::Error::TopicExists { topic: req.topic }.into());
    }
    Ok(Json(RegisterTopicResponse {
        topic: req.topic,
        created: true,
    }))
}

pub async fn produce(
    State(state): State<AppState>,
    Json(req): Json<ProduceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let epoch = require_leader(&state)?;
    let offset = state.storage.append(&req.topic, req.message, epoch).await?;
    let hwm = state.storage.get_hwm(&req.topic).await?;
    Ok(Json(ProduceResponse { offset, hwm }))
}

#[derive(Deserialize)]
pub struct ConsumeQuery {
    topic: String,
    offset: u64,
}

pub async fn consume(
    State(state): State<AppState>,
    Query(q): Query<ConsumeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let meta = state.storage.meta(&q.topic).await?;
    let visible_end = meta.hwm;
    let count = if q.offset >= visible_end {
        0
    } else {
        ((visible_end - q.offset) as usize).min(MAX_CONSUME_BATCH)
    };
    let records = if count == 0 {
        Vec::new()
    } else {
        state.storage.read(&q.topic, q.offset, count).await?
    };
    Ok(Json(ConsumeResponse {
        messages: records
            .into_iter()
            .map(|r| ConsumedRecord {
                offset: r.offset,
                topic: r.topic,
                message: r.message,
            })
            .collect(),
        hwm: meta.hwm,
        total_available: meta.next_offset,
        requested_offset: q.offset,
    }))
}

pub async fn replicate_push(
    State(state): State<AppState>,
    Json(req): Json<AppendReplicaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let snap = state.role();
    if snap.role == Role::Leader {
        return Err(ApiError::role_mismatch("this broker is the leader, not a follower"));
    }
    if req.epoch < snap.epoch {
        return Err(yak_core::Error::EpochStale {
            supplied: req.epoch,
            current: snap.epoch,
        }
        .into());
    }

    if !state.storage.topic_exists(&req.topic) {
        state.storage.register_topic(&req.topic).await?;
    }

    let meta = state.storage.meta(&req.topic).await?;
    if req.base_offset != meta.next_offset {
        // Divergence: truncate our own uncommitted suffix down to hwm right
        // away, so the leader's next push (from hwm) lands on a base_offset
        // that actually matches (spec.md §4.4 step 4). The committed prefix
        // up to hwm is guaranteed identical on both sides by induction, so
        // this is always safe.
        state.storage.truncate_to(&req.topic, meta.hwm).await?;
        return Err(ApiError::offset_mismatch(OffsetMismatchBody {
            follower_end: meta.next_offset,
            follower_end_epoch: meta.log_end_epoch,
        }));
    }

    for record in req.records {
        state.storage.append(&req.topic, record.message, record.epoch).await?;
    }
    let new_next = state.storage.length(&req.topic).await?;
    let target_hwm = req.leader_hwm.min(new_next);
    let current_hwm = state.storage.get_hwm(&req.topic).await?;
    if target_hwm > current_hwm {
        state.storage.set_hwm(&req.topic, target_hwm).await?;
    }
    let hwm = state.storage.get_hwm(&req.topic).await?;

    Ok(Json(AppendReplicaResponse {
        ack_end_offset: new_next,
        hwm,
    }))
}

#[derive(Deserialize)]
pub struct PullQuery {
    topic: String,
    from: u64,
    #[allow(dead_code)]
    epoch: u64,
}

pub async fn replicate_pull(
    State(state): State<AppState>,
    Query(q): Query<PullQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let snap = state.role();
    if snap.role != Role::Leader {
        return Err(ApiError::role_mismatch("this broker is not the leader"));
    }
    let meta = state.storage.meta(&q.topic).await?;
    let records = state
        .storage
        .read(&q.topic, q.from, 1024)
        .await?
        .into_iter()
        .map(|r| ReplicaRecord {
            offset: r.offset,
            message: r.message,
            epoch: r.epoch,
        })
        .collect();
    Ok(Json(PullReplicaResponse {
        base_offset: q.from,
        records,
        hwm: meta.hwm,
        leader_epoch: snap.epoch,
    }))
}

pub async fn metadata_leader(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.role();
    let leader = match snap.role {
        Role::Leader => Some(LeaderMetadata {
            broker_id: state.broker_id,
            host: state.advertise.host.clone(),
            port: state.advertise.port,
            epoch: snap.epoch,
        }),
        Role::Follower => snap.known_leader,
        Role::Unknown => None,
    };
    Json(MetadataLeaderResponse { leader })
}

pub async fn metadata_brokers(State(state): State<AppState>) -> impl IntoResponse {
    let mut brokers = Vec::new();
    for &id in state.configured_peers.iter().chain(std::iter::once(&state.broker_id)) {
        if let Ok(Some(raw)) = state.coord_store.get(&broker_key(id)).await {
            if let Ok(entry) = serde_json::from_str::<yak_coord::types::BrokerRegistryEntry>(&raw) {
                brokers.push(BrokerInfo {
                    broker_id: entry.broker_id,
                    host: entry.host,
                    port: entry.port,
                    last_heartbeat_at_ms: entry.last_heartbeat_at_ms,
                    last_seen_epoch: entry.last_seen_epoch,
                });
            }
        }
    }
    Json(MetadataBrokersResponse { brokers })
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.role();
    let role = match snap.role {
        Role::Leader => "LEADER",
        Role::Follower => "FOLLOWER",
        Role::Unknown => "UNKNOWN",
    };
    let mut topics = std::collections::BTreeMap::new();
    for topic in state.storage.list_topics() {
        if let Ok(meta) = state.storage.meta(&topic).await {
            topics.insert(
                topic,
                TopicHealth {
                    next_offset: meta.next_offset,
                    hwm: meta.hwm,
                },
            );
        }
    }
    Json(HealthResponse {
        role: role.to_string(),
        epoch: snap.epoch,
        topics,
    })
}

// Extends ApiError with the two response shapes that don't map directly
// from a `yak_core::Error` variant: the 307-equivalent redirect body and
// the 416 offset-mismatch body.
impl ApiError {
    fn role_mismatch_redirect(leader: LeaderMetadata) -> ApiError {
        ApiError::with_body(
            StatusCode::TEMPORARY_REDIRECT,
            Json(RedirectBody { leader }),
        )
    }

    fn offset_mismatch(body: OffsetMismatchBody) -> ApiError {
        ApiError::with_body(StatusCode::RANGE_NOT_SATISFIABLE, Json(body))
    }
}
