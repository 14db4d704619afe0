mod error;
mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use error::ApiError;

/// Builds the full HTTP surface from spec.md §6's endpoint table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register_topic", post(handlers::register_topic))
        .route("/produce", post(handlers::produce))
        .route("/consume", get(handlers::consume))
        .route("/replicate/push", post(handlers::replicate_push))
        .route("/replicate/pull", get(handlers::replicate_pull))
        .route("/metadata/leader", get(handlers::metadata_leader))
        .route("/metadata/brokers", get(handlers::metadata_brokers))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;
    use yak_coord::InMemoryCoordinationStore;
    use yak_core::proto::BrokerAddr;
    use yak_runtime::RoleSnapshot;
    use yak_storage::TopicStore;

    fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(TopicStore::open(dir.path()).unwrap());
        let coord_store: Arc<dyn yak_coord::CoordinationStore> =
            Arc::new(InMemoryCoordinationStore::new());
        let (_tx, rx) = tokio::sync::watch::channel(RoleSnapshot {
            role: yak_runtime::Role::Unknown,
            epoch: 0,
            known_leader: None,
        });
        AppState {
            broker_id: 1,
            advertise: BrokerAddr {
                broker_id: 1,
                host: "127.0.0.1".into(),
                port: 9000,
            },
            storage,
            coord_store,
            configured_peers: vec![],
            role_rx: rx,
        }
    }

    #[tokio::test]
    async fn health_reports_unknown_role_with_no_topics() {
        let app = router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn produce_rejected_when_role_unknown() {
        let app = router(test_state());
        let body = serde_json::to_vec(&yak_core::proto::ProduceRequest {
            topic: "orders".into(),
            message: b"hi".to_vec(),
        })
        .unwrap();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/produce")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
