use std::sync::Arc;

use tokio::sync::watch;
use yak_core::proto::BrokerAddr;
use yak_coord::CoordinationStore;
use yak_runtime::RoleSnapshot;
use yak_storage::TopicStore;

/// Shared state every HTTP handler reads from. Cloning is cheap: it's a
/// handful of `Arc`s and a `watch::Receiver` (spec.md §5's single
/// coherent role/epoch/leader snapshot).
#[derive(Clone)]
pub struct AppState {
    pub broker_id: u64,
    pub advertise: BrokerAddr,
    pub storage: Arc<TopicStore>,
    pub coord_store: Arc<dyn CoordinationStore>,
    pub configured_peers: Vec<u64>,
    pub role_rx: watch::Receiver<RoleSnapshot>,
}

impl AppState {
    pub fn role(&self) -> RoleSnapshot {
        self.role_rx.borrow().clone()
    }
}
