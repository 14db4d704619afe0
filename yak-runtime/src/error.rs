use thiserror::Error;

/// Errors from the lease acquisition/renewal loop. Never fatal to the
/// process: `LeaseManager` logs these and falls back to `Role::Unknown`,
/// retrying on its next tick (spec.md §7).
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("coordination store error: {0}")]
    Store(#[from] yak_coord::Error),

    #[error("lease record was malformed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors from replication push/pull. Connection and timeout failures are
/// expected and retried with backoff; storage errors escalate to a fatal
/// shutdown per spec.md §7.
#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("peer request failed: {0}")]
    Peer(#[from] reqwest::Error),

    #[error("local storage error: {0}")]
    Storage(#[from] yak_core::Error),

    #[error("replication rejected: epoch {supplied} is stale relative to {current}")]
    EpochStale { supplied: u64, current: u64 },

    #[error("peer returned unexpected status {status}")]
    UnexpectedStatus { status: reqwest::StatusCode },
}
