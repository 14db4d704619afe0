use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use yak_core::config::HEARTBEAT_INTERVAL;
use yak_core::proto::BrokerAddr;
use yak_coord::types::{broker_key, BrokerRegistryEntry};
use yak_coord::CoordinationStore;

use crate::lease::RoleSnapshot;

/// Publishes this broker's liveness, advertised address, and last-seen
/// epoch to the coordination store every `HEARTBEAT_INTERVAL` (spec.md
/// §4.6). `ReplicationCoordinator` reads these entries (via the same
/// store) to compute its alive-follower set.
pub struct HeartbeatReporter {
    broker_id: u64,
    advertise: BrokerAddr,
    store: Arc<dyn CoordinationStore>,
    role_rx: watch::Receiver<RoleSnapshot>,
}

impl HeartbeatReporter {
    pub fn spawn(
        broker_id: u64,
        advertise: BrokerAddr,
        store: Arc<dyn CoordinationStore>,
        role_rx: watch::Receiver<RoleSnapshot>,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        let reporter = HeartbeatReporter {
            broker_id,
            advertise,
            store,
            role_rx,
        };
        let task_cancel = cancel.clone();
        tokio::spawn(async move { reporter.run(task_cancel).await });
        cancel
    }

    async fn run(self, cancel: CancellationToken) {
        loop {
            if let Err(err) = self.publish_once().await {
                tracing::warn!(error = %err, broker_id = self.broker_id, "heartbeat publish failed");
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {}
            }
        }
    }

    async fn publish_once(&self) -> Result<(), yak_coord::Error> {
        let entry = BrokerRegistryEntry {
            broker_id: self.broker_id,
            host: self.advertise.host.clone(),
            port: self.advertise.port,
            last_heartbeat_at_ms: now_ms(),
            last_seen_epoch: self.role_rx.borrow().epoch,
        };
        let value = serde_json::to_string(&entry).expect("BrokerRegistryEntry always serializes");
        self.store
            .set_with_ttl(
                &broker_key(self.broker_id),
                &value,
                yak_core::config::HEARTBEAT_TTL,
            )
            .await
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}
