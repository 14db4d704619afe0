use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use axum::routing::{delete, get, put};
use serde::{Deserialize, Serialize};

use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/kv/{key}", get(get_key).delete(delete_key))
        .route("/kv/{key}/cas", put(cas_key))
        .route("/kv/{key}/ttl", put(set_with_ttl))
        .with_state(state)
}

#[derive(Serialize)]
struct GetResponse {
    value: String,
}

async fn get_key(State(state): State<AppState>, Path(key): Path<String>) -> impl IntoResponse {
    match state.store.get(&key) {
        Some(value) => (StatusCode::OK, Json(GetResponse { value })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_key(State(state): State<AppState>, Path(key): Path<String>) -> impl IntoResponse {
    state.store.delete(&key);
    StatusCode::OK
}

#[derive(Deserialize)]
struct CasRequest {
    expected: Option<String>,
    new: String,
}

#[derive(Serialize)]
struct CasResponse {
    applied: bool,
}

async fn cas_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<CasRequest>,
) -> impl IntoResponse {
    let applied = state.store.cas(&key, body.expected.as_deref(), &body.new);
    Json(CasResponse { applied })
}

#[derive(Deserialize)]
struct SetWithTtlRequest {
    value: String,
    ttl_ms: u64,
}

async fn set_with_ttl(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SetWithTtlRequest>,
) -> impl IntoResponse {
    state
        .store
        .set_with_ttl(&key, &body.value, Duration::from_millis(body.ttl_ms));
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState {
            store: Arc::new(Store::new()),
        })
    }

    #[tokio::test]
    async fn get_missing_key_is_404() {
        let response = app()
            .oneshot(Request::get("/kv/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cas_then_get_roundtrips() {
        let app = app();
        let cas_body = serde_json::to_vec(&CasRequest {
            expected: None,
            new: "v1".to_string(),
        })
        .unwrap();
        let response = app
            .clone()
            .oneshot(
                Request::put("/kv/k/cas")
                    .header("content-type", "application/json")
                    .body(Body::from(cas_body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/kv/k").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
