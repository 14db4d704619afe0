use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use yak_core::config::REPLICATION_POLL;
use yak_core::proto::{AppendReplicaRequest, BrokerAddr, ReplicaRecord};
use yak_core::{LogEndEpoch, Offset};
use yak_coord::types::{broker_key, BrokerRegistryEntry};
use yak_coord::CoordinationStore;
use yak_storage::TopicStore;

use crate::error::ReplicationError;
use crate::lease::{RoleSnapshot, StepDown};
use crate::peer_client::{PeerClient, PushOutcome};

/// How often the coordinator rescans topics and the alive-follower set
/// while leading (new topics may be registered, followers may come and
/// go between epochs).
const RESCAN_INTERVAL: std::time::Duration = REPLICATION_POLL;

/// Records appended to one follower/topic push in a single round.
const REPLICATION_BATCH: usize = 256;

/// Drives per-(follower, topic) replication push tasks while this broker
/// is leader (spec.md §4.3). Follows the teacher's per-key worker-task
/// map shape: tasks are added as followers/topics appear, cancelled as
/// they disappear or leadership is lost.
pub struct ReplicationCoordinator {
    broker_id: u64,
    storage: Arc<TopicStore>,
    coord_store: Arc<dyn CoordinationStore>,
    configured_peers: Vec<u64>,
    role_rx: watch::Receiver<RoleSnapshot>,
    step_down: StepDown,
}

struct PushTask {
    cancel: CancellationToken,
}

impl ReplicationCoordinator {
    pub fn spawn(
        broker_id: u64,
        storage: Arc<TopicStore>,
        coord_store: Arc<dyn CoordinationStore>,
        configured_peers: Vec<u64>,
        role_rx: watch::Receiver<RoleSnapshot>,
        step_down: StepDown,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        let coordinator = ReplicationCoordinator {
            broker_id,
            storage,
            coord_store,
            configured_peers,
            role_rx,
            step_down,
        };
        let task_cancel = cancel.clone();
        tokio::spawn(async move { coordinator.run(task_cancel).await });
        cancel
    }

    async fn run(mut self, cancel: CancellationToken) {
        let match_offsets: Arc<DashMap<(u64, String), Offset>> = Arc::new(DashMap::new());
        let mut tasks: HashMap<(u64, String), PushTask> = HashMap::new();
        let mut ticker = tokio::time::interval(RESCAN_INTERVAL);
        // Quorum denominator, frozen the first time we see each epoch
        // (spec.md §4.3): re-reading the alive set on every rescan and
        // handing each spawn its own snapshot would let concurrent
        // push_loop tasks for the same epoch disagree on what quorum
        // means.
        let mut epoch_quorum: Option<(LogEndEpoch, usize)> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    for (_, task) in tasks.drain() {
                        task.cancel.cancel();
                    }
                    return;
                }
                _ = self.role_rx.changed() => {}
                _ = ticker.tick() => {}
            }

            let snapshot = self.role_rx.borrow().clone();
            if !snapshot.is_leader() {
                for (_, task) in tasks.drain() {
                    task.cancel.cancel();
                }
                match_offsets.clear();
                epoch_quorum = None;
                continue;
            }

            let alive = self.alive_followers().await;
            let topics = self.storage.list_topics();

            let alive_follower_count = match epoch_quorum {
                Some((epoch, count)) if epoch == snapshot.epoch => count,
                _ => {
                    let count = alive.len();
                    epoch_quorum = Some((snapshot.epoch, count));
                    count
                }
            };

            let mut desired = HashSet::new();
            for peer in &alive {
                for topic in &topics {
                    desired.insert((peer.broker_id, topic.clone()));
                }
            }

            tasks.retain(|key, task| {
                if desired.contains(key) {
                    true
                } else {
                    task.cancel.cancel();
                    match_offsets.remove(key);
                    false
                }
            });

            for peer in &alive {
                for topic in &topics {
                    let key = (peer.broker_id, topic.clone());
                    if tasks.contains_key(&key) {
                        continue;
                    }
                    let task_cancel = CancellationToken::new();
                    let peer_client = match PeerClient::new(peer.addr.clone()) {
                        Ok(c) => c,
                        Err(err) => {
                            tracing::warn!(error = %err, broker_id = peer.broker_id, "failed to build peer client");
                            continue;
                        }
                    };
                    tokio::spawn(push_loop(
                        peer.broker_id,
                        topic.clone(),
                        snapshot.epoch,
                        Arc::clone(&self.storage),
                        peer_client,
                        Arc::clone(&match_offsets),
                        alive_follower_count,
                        self.step_down.clone(),
                        task_cancel.clone(),
                    ));
                    tasks.insert(key, PushTask { cancel: task_cancel });
                }
            }
        }
    }

    async fn alive_followers(&self) -> Vec<AlivePeer> {
        let mut alive = Vec::new();
        for &broker_id in &self.configured_peers {
            if broker_id == self.broker_id {
                continue;
            }
            let Ok(Some(raw)) = self.coord_store.get(&broker_key(broker_id)).await else {
                continue;
            };
            let Ok(entry) = serde_json::from_str::<BrokerRegistryEntry>(&raw) else {
                continue;
            };
            alive.push(AlivePeer {
                broker_id: entry.broker_id,
                addr: BrokerAddr {
                    broker_id: entry.broker_id,
                    host: entry.host,
                    port: entry.port,
                },
            });
        }
        alive
    }
}

struct AlivePeer {
    broker_id: u64,
    addr: BrokerAddr,
}

async fn push_loop(
    broker_id: u64,
    topic: String,
    epoch: LogEndEpoch,
    storage: Arc<TopicStore>,
    peer: PeerClient,
    match_offsets: Arc<DashMap<(u64, String), Offset>>,
    alive_follower_count: usize,
    step_down: StepDown,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(REPLICATION_POLL) => {}
        }

        let key = (broker_id, topic.clone());
        let match_offset = match_offsets.get(&key).map(|v| *v).unwrap_or(0);
        let next_offset = match storage.length(&topic).await {
            Ok(n) => n,
            Err(_) => continue,
        };
        let leader_hwm = storage.get_hwm(&topic).await.unwrap_or(0);

        // Always push, even with an empty batch, so `leader_hwm` keeps
        // flowing to a follower that has already caught up (otherwise a
        // quiescent cluster would never let a follower's hwm converge).
        let records = if next_offset > match_offset {
            match storage.read(&topic, match_offset, REPLICATION_BATCH).await {
                Ok(r) => r,
                Err(err) => {
                    tracing::warn!(error = %err, topic, "failed to read local log for replication");
                    continue;
                }
            }
        } else {
            Vec::new()
        };
        {
            let req = AppendReplicaRequest {
                epoch,
                topic: topic.clone(),
                base_offset: match_offset,
                records: records
                    .into_iter()
                    .map(|r| ReplicaRecord {
                        offset: r.offset,
                        message: r.message,
                        epoch: r.epoch,
                    })
                    .collect(),
                leader_hwm,
            };
            match peer.push(&req).await {
                Ok(PushOutcome::Applied(resp)) => {
                    match_offsets.insert(key.clone(), resp.ack_end_offset);
                }
                Ok(PushOutcome::OffsetMismatch(body)) => {
                    // Follower reported its own end; retry from its
                    // reported end if it's behind ours, otherwise from
                    // hwm per spec.md §4.4's divergence resolution.
                    let hwm = storage.get_hwm(&topic).await.unwrap_or(0);
                    let resync_from = body.follower_end.min(hwm);
                    match_offsets.insert(key.clone(), resync_from);
                }
                Err(ReplicationError::EpochStale { supplied, current }) => {
                    tracing::warn!(
                        supplied,
                        current,
                        broker_id,
                        topic,
                        "peer rejected our epoch as stale, stepping down"
                    );
                    step_down.force_unknown();
                    return;
                }
                Err(err) => {
                    tracing::warn!(error = %err, broker_id, topic, "replication push failed, retrying");
                }
            }
        }

        recompute_hwm(&topic, &storage, &match_offsets, alive_follower_count).await;
    }
}

/// `hwm = min(next_offset, max over quorum Q of match_offset[q])`
/// (spec.md §4.3), `Q` = majority including the leader, against the
/// alive-follower set recorded for this epoch.
async fn recompute_hwm(
    topic: &str,
    storage: &Arc<TopicStore>,
    match_offsets: &DashMap<(u64, String), Offset>,
    alive_follower_count: usize,
) {
    let Ok(leader_end) = storage.length(topic).await else {
        return;
    };
    let mut acked: Vec<Offset> = match_offsets
        .iter()
        .filter(|entry| entry.key().1 == topic)
        .map(|entry| *entry.value())
        .collect();
    acked.push(leader_end); // the leader always "acks" its own writes

    let quorum_size = (alive_follower_count + 1) / 2 + 1;
    acked.sort_unstable_by(|a, b| b.cmp(a)); // descending
    let candidate = acked
        .get(quorum_size.saturating_sub(1))
        .copied()
        .unwrap_or(0)
        .min(leader_end);

    if candidate > 0 {
        if let Err(err) = storage.set_hwm(topic, candidate).await {
            tracing::debug!(%err, topic, candidate, "hwm update skipped");
        }
    }
}
