//! End-to-end cluster scenarios from spec.md §8, driven over real HTTP
//! against in-process brokers sharing one `InMemoryCoordinationStore`
//! (standing in for an external etcd/Consul deployment in these tests).

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use yak_broker::http;
use yak_broker::state::AppState;
use yak_core::config::{HEARTBEAT_TTL, LEASE_TTL, RENEW_INTERVAL};
use yak_core::proto::{BrokerAddr, ConsumeResponse, HealthResponse, ProduceResponse, RegisterTopicResponse};
use yak_coord::{CoordinationStore, InMemoryCoordinationStore};
use yak_runtime::{
    HeartbeatReporter, LeaseManager, ReplicationCoordinator, ReplicationWorker, RoleSnapshot, StepDown,
};
use yak_storage::TopicStore;

struct SpawnedBroker {
    broker_id: u64,
    addr: BrokerAddr,
    storage: Arc<TopicStore>,
    coord_store: Arc<dyn CoordinationStore>,
    role_rx: watch::Receiver<RoleSnapshot>,
    step_down: StepDown,
    lease_cancel: CancellationToken,
    heartbeat_cancel: CancellationToken,
    coordinator_cancel: CancellationToken,
    worker_cancel: CancellationToken,
}

impl SpawnedBroker {
    fn base_url(&self) -> String {
        self.addr.base_url()
    }

    async fn wait_for_role(&mut self, leader: bool, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.role_rx.borrow().is_leader() == leader {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            let _ = tokio::time::timeout(Duration::from_millis(100), self.role_rx.changed()).await;
        }
    }

    fn stop(self) {
        self.lease_cancel.cancel();
        self.heartbeat_cancel.cancel();
        self.coordinator_cancel.cancel();
        self.worker_cancel.cancel();
    }
}

async fn spawn_broker(
    broker_id: u64,
    coord_store: Arc<dyn CoordinationStore>,
    peers: Vec<u64>,
) -> SpawnedBroker {
    let data_dir = tempfile::tempdir().unwrap();
    // Leaked intentionally: each test broker's temp dir must outlive its
    // background tasks, which is simplest to guarantee for the lifetime of
    // a short-lived test process.
    let data_dir = Box::leak(Box::new(data_dir));
    let storage = Arc::new(TopicStore::open(data_dir.path()).unwrap());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let advertise = BrokerAddr {
        broker_id,
        host: "127.0.0.1".to_string(),
        port,
    };

    let (role_rx, lease_cancel, step_down) =
        LeaseManager::spawn(broker_id, advertise.clone(), Arc::clone(&coord_store));
    let heartbeat_cancel = HeartbeatReporter::spawn(broker_id, advertise.clone(), Arc::clone(&coord_store), role_rx.clone());
    let coordinator_cancel = ReplicationCoordinator::spawn(
        broker_id,
        Arc::clone(&storage),
        Arc::clone(&coord_store),
        peers,
        role_rx.clone(),
        step_down.clone(),
    );
    let worker_cancel = ReplicationWorker::spawn(Arc::clone(&storage), role_rx.clone());

    let state = AppState {
        broker_id,
        advertise: advertise.clone(),
        storage: Arc::clone(&storage),
        coord_store: Arc::clone(&coord_store),
        configured_peers: vec![],
        role_rx: role_rx.clone(),
    };
    let app = http::router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    SpawnedBroker {
        broker_id,
        addr: advertise,
        storage,
        coord_store,
        role_rx,
        step_down,
        lease_cancel,
        heartbeat_cancel,
        coordinator_cancel,
        worker_cancel,
    }
}

#[tokio::test]
async fn single_broker_happy_path() {
    let coord_store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
    let mut b1 = spawn_broker(1, coord_store, vec![]).await;
    assert!(b1.wait_for_role(true, LEASE_TTL + RENEW_INTERVAL).await, "broker never became leader");

    let client = Client::new();
    let resp: RegisterTopicResponse = client
        .post(format!("{}/register_topic", b1.base_url()))
        .json(&yak_core::proto::RegisterTopicRequest { topic: "t".into() })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(resp.created);

    for message in ["a", "b", "c"] {
        client
            .post(format!("{}/produce", b1.base_url()))
            .json(&yak_core::proto::ProduceRequest {
                topic: "t".into(),
                message: message.as_bytes().to_vec(),
            })
            .send()
            .await
            .unwrap();
    }

    let consumed: ConsumeResponse = client
        .get(format!("{}/consume?topic=t&offset=0", b1.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(consumed.hwm, 3);
    assert_eq!(consumed.messages.len(), 3);
    assert_eq!(consumed.messages[0].message, b"a");
    assert_eq!(consumed.messages[2].message, b"c");

    b1.stop();
}

#[tokio::test]
async fn follower_redirect() {
    let coord_store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
    let mut b1 = spawn_broker(1, Arc::clone(&coord_store), vec![2]).await;
    assert!(b1.wait_for_role(true, LEASE_TTL + RENEW_INTERVAL).await);
    let mut b2 = spawn_broker(2, Arc::clone(&coord_store), vec![1]).await;
    assert!(b2.wait_for_role(false, LEASE_TTL + RENEW_INTERVAL).await);

    let client = Client::new();
    client
        .post(format!("{}/register_topic", b1.base_url()))
        .json(&yak_core::proto::RegisterTopicRequest { topic: "t".into() })
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/produce", b2.base_url()))
        .json(&yak_core::proto::ProduceRequest {
            topic: "t".into(),
            message: b"x".to_vec(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
    let body: yak_core::proto::RedirectBody = resp.json().await.unwrap();
    assert_eq!(body.leader.broker_id, 1);

    let produced: ProduceResponse = client
        .post(format!("{}/produce", b1.base_url()))
        .json(&yak_core::proto::ProduceRequest {
            topic: "t".into(),
            message: b"x".to_vec(),
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(produced.offset, 0);

    b1.stop();
    b2.stop();
}

#[tokio::test]
async fn replication_convergence() {
    let coord_store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
    let mut b1 = spawn_broker(1, Arc::clone(&coord_store), vec![2]).await;
    assert!(b1.wait_for_role(true, LEASE_TTL + RENEW_INTERVAL).await);

    let client = Client::new();
    client
        .post(format!("{}/register_topic", b1.base_url()))
        .json(&yak_core::proto::RegisterTopicRequest { topic: "t".into() })
        .send()
        .await
        .unwrap();
    for i in 0..100 {
        client
            .post(format!("{}/produce", b1.base_url()))
            .json(&yak_core::proto::ProduceRequest {
                topic: "t".into(),
                message: format!("msg-{i}").into_bytes(),
            })
            .send()
            .await
            .unwrap();
    }

    let mut b2 = spawn_broker(2, Arc::clone(&coord_store), vec![1]).await;
    assert!(b2.wait_for_role(false, LEASE_TTL + RENEW_INTERVAL).await);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let health: HealthResponse = client
            .get(format!("{}/health", b2.base_url()))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if let Some(info) = health.topics.get("t") {
            if info.next_offset == 100 && info.hwm == 100 {
                break;
            }
        }
        assert!(tokio::time::Instant::now() < deadline, "replication never converged");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    b1.stop();
    b2.stop();
}

#[tokio::test]
async fn leader_failover() {
    let coord_store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
    let mut b1 = spawn_broker(1, Arc::clone(&coord_store), vec![2, 3]).await;
    assert!(b1.wait_for_role(true, LEASE_TTL + RENEW_INTERVAL).await);
    let mut b2 = spawn_broker(2, Arc::clone(&coord_store), vec![1, 3]).await;
    let mut b3 = spawn_broker(3, Arc::clone(&coord_store), vec![1, 2]).await;

    let client = Client::new();
    client
        .post(format!("{}/register_topic", b1.base_url()))
        .json(&yak_core::proto::RegisterTopicRequest { topic: "t".into() })
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/produce", b1.base_url()))
        .json(&yak_core::proto::ProduceRequest {
            topic: "t".into(),
            message: b"before-failover".to_vec(),
        })
        .send()
        .await
        .unwrap();
    let old_epoch = b1.role_rx.borrow().epoch;

    b1.stop();
    coord_store.delete(&yak_coord::types::lease_key()).await.unwrap();

    let became_leader = tokio::time::timeout(LEASE_TTL + RENEW_INTERVAL * 3, async {
        loop {
            if b2.role_rx.borrow().is_leader() || b3.role_rx.borrow().is_leader() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    assert!(became_leader.is_ok(), "no successor took over leadership");

    let (new_leader, new_epoch) = if b2.role_rx.borrow().is_leader() {
        (&b2, b2.role_rx.borrow().epoch)
    } else {
        (&b3, b3.role_rx.borrow().epoch)
    };
    assert!(new_epoch > old_epoch);

    let produced: ProduceResponse = client
        .post(format!("{}/produce", new_leader.base_url()))
        .json(&yak_core::proto::ProduceRequest {
            topic: "t".into(),
            message: b"after-failover".to_vec(),
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(produced.offset >= 1);

    b2.stop();
    b3.stop();
}

#[tokio::test]
async fn divergence_pruning() {
    let coord_store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
    let mut b1 = spawn_broker(1, Arc::clone(&coord_store), vec![2]).await;
    assert!(b1.wait_for_role(true, LEASE_TTL + RENEW_INTERVAL).await);
    let mut b2 = spawn_broker(2, Arc::clone(&coord_store), vec![1]).await;
    assert!(b2.wait_for_role(false, LEASE_TTL + RENEW_INTERVAL).await);

    let client = Client::new();
    client
        .post(format!("{}/register_topic", b1.base_url()))
        .json(&yak_core::proto::RegisterTopicRequest { topic: "t".into() })
        .send()
        .await
        .unwrap();
    for i in 0..3 {
        client
            .post(format!("{}/produce", b1.base_url()))
            .json(&yak_core::proto::ProduceRequest {
                topic: "t".into(),
                message: format!("committed-{i}").into_bytes(),
            })
            .send()
            .await
            .unwrap();
    }

    // Wait for B2 to catch up to the committed prefix before corrupting it.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if b2.storage.get_hwm("t").await.unwrap_or(0) == 3 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "follower never reached initial hwm");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Cancel B2's pull-based catch-up worker so only the leader's push path
    // (the mechanism spec.md §4.4 actually describes for divergence
    // resolution) drives the rest of this test; otherwise the two
    // independent appenders could race on the same offsets.
    b2.worker_cancel.cancel();

    // Force B2 to hold an uncommitted extra record under a stale epoch, as
    // if it had briefly served as leader before losing an election race
    // (spec.md §4.4's divergence resolution).
    b2.storage.register_topic("t").await.ok();
    b2.storage.append("t", b"stale-uncommitted".to_vec(), 0).await.unwrap();
    assert_eq!(b2.storage.length("t").await.unwrap(), 4);

    // B1 keeps producing under its real epoch; B1's push loop should detect
    // the offset mismatch on its next push, which makes B2 truncate back to
    // its hwm and resync cleanly rather than keeping the stale tail.
    for i in 0..2 {
        client
            .post(format!("{}/produce", b1.base_url()))
            .json(&yak_core::proto::ProduceRequest {
                topic: "t".into(),
                message: format!("after-divergence-{i}").into_bytes(),
            })
            .send()
            .await
            .unwrap();
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let meta_b1 = b1.storage.meta("t").await.unwrap();
        let meta_b2 = b2.storage.meta("t").await.unwrap();
        if meta_b2.next_offset == meta_b1.next_offset && meta_b2.hwm == meta_b1.hwm {
            let records = b2.storage.read("t", 0, 10).await.unwrap();
            assert!(records.iter().all(|r| r.message != b"stale-uncommitted"));
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "follower never pruned its divergent tail");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    b1.stop();
    b2.stop();
}

#[tokio::test]
async fn partition_heal() {
    let coord_store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
    let mut b1 = spawn_broker(1, Arc::clone(&coord_store), vec![2]).await;
    assert!(b1.wait_for_role(true, LEASE_TTL + RENEW_INTERVAL).await);
    let mut b2 = spawn_broker(2, Arc::clone(&coord_store), vec![1]).await;
    assert!(b2.wait_for_role(false, LEASE_TTL + RENEW_INTERVAL).await);

    let client = Client::new();
    client
        .post(format!("{}/register_topic", b1.base_url()))
        .json(&yak_core::proto::RegisterTopicRequest { topic: "t".into() })
        .send()
        .await
        .unwrap();

    // Simulate B2 losing contact with the cluster: cancel both replication
    // paths between the two brokers. Both HTTP endpoints stay up, so
    // disabling only one side would leave the other (leader push or
    // follower pull) free to converge the log on its own — a real
    // partition blocks both directions at once.
    b1.coordinator_cancel.cancel();
    b2.worker_cancel.cancel();

    for i in 0..50 {
        client
            .post(format!("{}/produce", b1.base_url()))
            .json(&yak_core::proto::ProduceRequest {
                topic: "t".into(),
                message: format!("during-partition-{i}").into_bytes(),
            })
            .send()
            .await
            .unwrap();
    }
    tokio::time::sleep(HEARTBEAT_TTL + Duration::from_millis(200)).await;
    assert_eq!(b2.storage.meta("t").await.map(|m| m.next_offset).unwrap_or(0), 0);

    // Heal the partition: respawn both sides, as reconnecting processes
    // would.
    b1.coordinator_cancel = ReplicationCoordinator::spawn(
        b1.broker_id,
        Arc::clone(&b1.storage),
        Arc::clone(&b1.coord_store),
        vec![2],
        b1.role_rx.clone(),
        b1.step_down.clone(),
    );
    b2.worker_cancel = ReplicationWorker::spawn(Arc::clone(&b2.storage), b2.role_rx.clone());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let meta_b1 = b1.storage.meta("t").await.unwrap();
        let meta_b2 = b2.storage.meta("t").await.unwrap();
        if meta_b2.next_offset == meta_b1.next_offset && meta_b2.hwm == meta_b1.hwm {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "follower never caught up after the partition healed");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    b1.stop();
    b2.stop();
}
