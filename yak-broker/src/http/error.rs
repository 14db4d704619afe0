use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use yak_core::proto::{ApiErrorBody, ApiErrorKind};

/// Maps domain errors onto the status codes in spec.md §6's error table.
/// Most variants carry the standard `ApiErrorBody`; `Redirect` and
/// `OffsetMismatch` carry their own response shapes (spec.md §6's
/// `RedirectBody` and `OffsetMismatchBody`) since those aren't expressible
/// as a `yak_core::Error`.
pub enum ApiError {
    Standard {
        status: StatusCode,
        kind: ApiErrorKind,
        message: String,
    },
    Raw {
        status: StatusCode,
        body: axum::response::Response,
    },
}

impl ApiError {
    pub fn new(status: StatusCode, kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self::Standard {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, ApiErrorKind::Unavailable, message)
    }

    pub fn role_mismatch(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, ApiErrorKind::RoleMismatch, message)
    }

    pub fn with_body<T: Serialize>(status: StatusCode, json: Json<T>) -> Self {
        let mut resp = json.into_response();
        *resp.status_mut() = status;
        Self::Raw { status, body: resp }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Standard { status, kind, message } => {
                (status, Json(ApiErrorBody { kind, message })).into_response()
            }
            ApiError::Raw { body, .. } => body,
        }
    }
}

impl From<yak_core::Error> for ApiError {
    fn from(err: yak_core::Error) -> Self {
        use yak_core::Error::*;
        match err {
            NoSuchTopic { .. } => ApiError::new(StatusCode::NOT_FOUND, ApiErrorKind::NoSuchTopic, err.to_string()),
            TopicExists { .. } => ApiError::new(StatusCode::CONFLICT, ApiErrorKind::TopicExists, err.to_string()),
            EpochStale { .. } => ApiError::new(StatusCode::CONFLICT, ApiErrorKind::EpochStale, err.to_string()),
            OutOfRange { .. } | InvalidHwm { .. } | TruncateBelowHwm { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, ApiErrorKind::BadRequest, err.to_string())
            }
            Storage { .. } | Corrupt { .. } => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, ApiErrorKind::Unavailable, err.to_string())
            }
        }
    }
}
