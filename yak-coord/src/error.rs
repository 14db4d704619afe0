use thiserror::Error;

/// Errors from talking to the coordination store, whether in-memory or
/// over HTTP. `CoordinationStore::cas` signals a lost race with `Ok(false)`
/// and `CoordinationStore::get` signals a missing key with `Ok(None)`, so
/// every variant here is transient-and-retry; callers in `yak-runtime`
/// collapse role to UNKNOWN on any of them (spec.md §7).
#[derive(Debug, Error)]
pub enum Error {
    #[error("coordination store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("coordination store returned malformed data for {key:?}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("coordination store responded with unexpected status {status} for {key:?}")]
    UnexpectedStatus {
        key: String,
        status: reqwest::StatusCode,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
