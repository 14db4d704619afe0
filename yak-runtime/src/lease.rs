use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use yak_core::config::{LEASE_TTL, RENEW_INTERVAL};
use yak_core::proto::{BrokerAddr, LeaderMetadata};
use yak_core::LogEndEpoch;
use yak_coord::types::{lease_key, LeaseRecord};
use yak_coord::CoordinationStore;

use crate::error::LeaseError;

/// This broker's relationship to the cluster-wide leader lease, as last
/// observed by its `LeaseManager`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
    /// Coordination store unreachable, or no lease has ever been
    /// observed. HTTP handlers must reject writes in this state
    /// (spec.md §7).
    Unknown,
}

/// A coherent snapshot of role/epoch/known-leader, broadcast over a
/// `watch` channel so every reader sees a consistent triple rather than
/// three independently-racing fields (spec.md §5).
#[derive(Clone, Debug, PartialEq)]
pub struct RoleSnapshot {
    pub role: Role,
    pub epoch: LogEndEpoch,
    pub known_leader: Option<LeaderMetadata>,
}

impl RoleSnapshot {
    fn unknown() -> Self {
        Self {
            role: Role::Unknown,
            epoch: 0,
            known_leader: None,
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role, Role::Leader)
    }
}

/// Lets a component other than `LeaseManager` itself force this broker
/// out of the leader role immediately, without waiting for the next
/// renewal tick — used when a replication peer reports our epoch is
/// stale (spec.md §4.3 point 4: "on 409 EPOCH_STALE, step down").
#[derive(Clone)]
pub struct StepDown {
    state_tx: Arc<watch::Sender<RoleSnapshot>>,
}

impl StepDown {
    pub fn force_unknown(&self) {
        self.state_tx.send_if_modified(|snap| {
            if matches!(snap.role, Role::Unknown) {
                false
            } else {
                *snap = RoleSnapshot::unknown();
                true
            }
        });
    }
}

/// Acquires and renews the cluster leader lease (spec.md §4.2). Owns the
/// sole `watch::Sender` for this broker's role; every other component
/// reads role/epoch through a cloned `watch::Receiver`.
pub struct LeaseManager {
    broker_id: u64,
    advertise: BrokerAddr,
    store: Arc<dyn CoordinationStore>,
    state_tx: Arc<watch::Sender<RoleSnapshot>>,
}

impl LeaseManager {
    /// Spawns the renewal loop and returns a receiver for role snapshots,
    /// a token that cancels the loop (and, on drop of the last clone,
    /// releases the lease if held), and a [`StepDown`] handle.
    pub fn spawn(
        broker_id: u64,
        advertise: BrokerAddr,
        store: Arc<dyn CoordinationStore>,
    ) -> (watch::Receiver<RoleSnapshot>, CancellationToken, StepDown) {
        let (state_tx, state_rx) = watch::channel(RoleSnapshot::unknown());
        let state_tx = Arc::new(state_tx);
        let cancel = CancellationToken::new();
        let step_down = StepDown {
            state_tx: Arc::clone(&state_tx),
        };
        let manager = LeaseManager {
            broker_id,
            advertise,
            store,
            state_tx,
        };
        let task_cancel = cancel.clone();
        tokio::spawn(async move { manager.run(task_cancel).await });
        (state_rx, cancel, step_down)
    }

    async fn run(mut self, cancel: CancellationToken) {
        loop {
            if let Err(err) = self.try_acquire_or_renew().await {
                tracing::warn!(error = %err, broker_id = self.broker_id, "lease acquire/renew failed");
                self.state_tx.send_if_modified(|snap| {
                    if matches!(snap.role, Role::Unknown) {
                        false
                    } else {
                        *snap = RoleSnapshot::unknown();
                        true
                    }
                });
            }

            let jitter_ms = rand::rng().random_range(0..250);
            let delay = RENEW_INTERVAL + std::time::Duration::from_millis(jitter_ms);
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.release_if_leader().await;
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn try_acquire_or_renew(&mut self) -> Result<(), LeaseError> {
        let now_ms = now_ms();
        let current_raw = self.store.get(&lease_key()).await?;
        let current: Option<LeaseRecord> = current_raw
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        let currently_holder = current
            .as_ref()
            .is_some_and(|l| l.holder_broker_id == self.broker_id);

        if currently_holder {
            let record = current.expect("currently_holder implies Some");
            let renewed = LeaseRecord {
                holder_broker_id: self.broker_id,
                epoch: record.epoch,
                expires_at_ms: now_ms + LEASE_TTL.as_millis() as i64,
            };
            let applied = self
                .store
                .cas(&lease_key(), current_raw.as_deref(), &serde_json::to_string(&renewed)?)
                .await?;
            if applied {
                self.update_leader(Role::Leader, renewed.epoch, Some(self.leader_metadata(renewed.epoch)));
                return Ok(());
            }
            // Lost the lease to someone else's concurrent renewal/takeover.
            self.refresh_follower_view().await?;
            return Ok(());
        }

        let lease_free = match current.as_ref() {
            Some(l) => l.expires_at_ms < now_ms,
            None => true,
        };

        if lease_free {
            let prior_epoch = current.as_ref().map_or(0, |l| l.epoch);
            let candidate = LeaseRecord {
                holder_broker_id: self.broker_id,
                epoch: prior_epoch + 1,
                expires_at_ms: now_ms + LEASE_TTL.as_millis() as i64,
            };
            let applied = self
                .store
                .cas(&lease_key(), current_raw.as_deref(), &serde_json::to_string(&candidate)?)
                .await?;
            if applied {
                self.update_leader(Role::Leader, candidate.epoch, Some(self.leader_metadata(candidate.epoch)));
                return Ok(());
            }
        }

        self.refresh_follower_view().await?;
        Ok(())
    }

    async fn refresh_follower_view(&mut self) -> Result<(), LeaseError> {
        let raw = self.store.get(&lease_key()).await?;
        let record: Option<LeaseRecord> = raw.as_deref().map(serde_json::from_str).transpose()?;
        match record {
            Some(l) => {
                // Host/port of the holder live in the broker registry,
                // not the lease record; look them up so followers and
                // clients don't need a second round trip.
                let addr = self
                    .store
                    .get(&yak_coord::types::broker_key(l.holder_broker_id))
                    .await?
                    .and_then(|raw| serde_json::from_str::<yak_coord::types::BrokerRegistryEntry>(&raw).ok());
                let leader = LeaderMetadata {
                    broker_id: l.holder_broker_id,
                    host: addr.as_ref().map_or_else(String::new, |a| a.host.clone()),
                    port: addr.map_or(0, |a| a.port),
                    epoch: l.epoch,
                };
                self.update_leader(Role::Follower, l.epoch, Some(leader));
            }
            // The lease key can be momentarily absent during a clean
            // handoff (holder CAS-deletes on shutdown before a successor
            // acquires it, spec.md §5). Epoch must never regress in a
            // follower's view, since `replicate_push`'s fencing check
            // compares against it directly — hold the last-known value.
            None => self.update_leader(Role::Follower, self.current_epoch(), None),
        }
        Ok(())
    }

    fn current_epoch(&self) -> LogEndEpoch {
        self.state_tx.borrow().epoch
    }

    fn leader_metadata(&self, epoch: LogEndEpoch) -> LeaderMetadata {
        LeaderMetadata {
            broker_id: self.broker_id,
            host: self.advertise.host.clone(),
            port: self.advertise.port,
            epoch,
        }
    }

    fn update_leader(&mut self, role: Role, epoch: LogEndEpoch, known_leader: Option<LeaderMetadata>) {
        let next = RoleSnapshot {
            role,
            epoch,
            known_leader,
        };
        self.state_tx.send_if_modified(|snap| {
            if *snap == next {
                false
            } else {
                *snap = next.clone();
                true
            }
        });
    }

    async fn release_if_leader(&self) {
        let Some(raw) = self.store.get(&lease_key()).await.ok().flatten() else {
            return;
        };
        let Ok(record) = serde_json::from_str::<LeaseRecord>(&raw) else {
            return;
        };
        if record.holder_broker_id == self.broker_id {
            if let Err(err) = self.store.delete(&lease_key()).await {
                tracing::warn!(error = %err, "failed to release lease on shutdown");
            }
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}
