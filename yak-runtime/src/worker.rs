use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use yak_core::config::{REPLICATION_POLL, REQUEST_TIMEOUT};
use yak_core::proto::{BrokerAddr, HealthResponse, LeaderMetadata};
use yak_storage::TopicStore;

use crate::lease::RoleSnapshot;
use crate::peer_client::PeerClient;

/// Per-topic state of a `ReplicationWorker`, adapted from
/// `watcher.rs`'s `State::{Empty,InitListed,Watching}` trampoline: a
/// follower starts not knowing the leader, learns it and begins
/// catching up, then settles into steady-state streaming once its log
/// matches the leader's.
#[derive(Debug)]
enum TopicState {
    Discovering,
    CatchingUp,
    Streaming,
}

/// Follower-side replication: discovers topics from the leader's
/// `/health` snapshot, pulls records to converge, and tracks per-topic
/// progress toward steady state (spec.md §4.4).
pub struct ReplicationWorker {
    storage: Arc<TopicStore>,
    role_rx: watch::Receiver<RoleSnapshot>,
}

impl ReplicationWorker {
    pub fn spawn(storage: Arc<TopicStore>, role_rx: watch::Receiver<RoleSnapshot>) -> CancellationToken {
        let cancel = CancellationToken::new();
        let worker = ReplicationWorker { storage, role_rx };
        let task_cancel = cancel.clone();
        tokio::spawn(async move { worker.run(task_cancel).await });
        cancel
    }

    async fn run(mut self, cancel: CancellationToken) {
        let mut states: HashMap<String, TopicState> = HashMap::new();
        let mut ticker = tokio::time::interval(REPLICATION_POLL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.role_rx.changed() => {}
                _ = ticker.tick() => {}
            }

            let snapshot = self.role_rx.borrow().clone();
            if snapshot.is_leader() {
                states.clear();
                continue;
            }
            let Some(leader) = snapshot.known_leader.clone() else {
                states.clear();
                continue;
            };
            if leader.host.is_empty() {
                continue; // not yet resolvable via the broker registry
            }

            if let Err(err) = self.reconcile(&leader, &mut states).await {
                tracing::warn!(error = %err, "replication catch-up round failed");
            }
        }
    }

    async fn reconcile(
        &self,
        leader: &LeaderMetadata,
        states: &mut HashMap<String, TopicState>,
    ) -> Result<(), crate::error::ReplicationError> {
        let addr = BrokerAddr {
            broker_id: leader.broker_id,
            host: leader.host.clone(),
            port: leader.port,
        };
        let peer = PeerClient::new(addr.clone())?;
        let health = fetch_health(&addr).await?;

        for (topic, info) in &health.topics {
            if !self.storage.topic_exists(topic) {
                let _ = self.storage.register_topic(topic).await;
                states.insert(topic.clone(), TopicState::Discovering);
            }

            let meta = match self.storage.meta(topic).await {
                Ok(m) => m,
                Err(_) => continue,
            };

            if meta.next_offset == info.next_offset && meta.hwm == info.hwm {
                states.insert(topic.clone(), TopicState::Streaming);
                continue;
            }
            states.insert(topic.clone(), TopicState::CatchingUp);

            let pull = peer.pull(topic, meta.next_offset, leader.epoch).await?;
            if pull.base_offset != meta.next_offset {
                // Diverged: fall back to the committed prefix and retry
                // next round (spec.md §4.4's divergence resolution).
                let hwm = self.storage.get_hwm(topic).await.unwrap_or(0);
                let _ = self.storage.truncate_to(topic, hwm).await;
                continue;
            }
            for record in pull.records {
                self.storage.append(topic, record.message, record.epoch).await?;
            }
            let new_next = self.storage.length(topic).await?;
            let target_hwm = pull.hwm.min(new_next);
            let _ = self.storage.set_hwm(topic, target_hwm).await;
        }
        Ok(())
    }
}

async fn fetch_health(addr: &BrokerAddr) -> Result<HealthResponse, crate::error::ReplicationError> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let resp = client
        .get(format!("{}/health", addr.base_url()))
        .send()
        .await?;
    if resp.status() != reqwest::StatusCode::OK {
        return Err(crate::error::ReplicationError::UnexpectedStatus { status: resp.status() });
    }
    Ok(resp.json().await?)
}
