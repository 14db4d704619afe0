use thiserror::Error;

use crate::record::Offset;

/// Errors raised by the storage engine and shared domain logic.
///
/// HTTP handlers in `yak-broker` translate these into the status codes
/// from spec.md §6; background tasks in `yak-runtime` log-and-retry the
/// transient variants. [`Error::Storage`] and [`Error::Corrupt`] also
/// count against `TopicStore`'s [`crate::FatalGuard`] streak, which
/// escalates to a fatal shutdown after repeated consecutive failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("topic {topic:?} does not exist")]
    NoSuchTopic { topic: String },

    #[error("topic {topic:?} already exists")]
    TopicExists { topic: String },

    #[error("requested offset {requested} is beyond the log end {next_offset} for topic {topic:?}")]
    OutOfRange {
        topic: String,
        requested: Offset,
        next_offset: Offset,
    },

    #[error("cannot set hwm to {requested} for topic {topic:?}: current hwm is {current}, log end is {next_offset}")]
    InvalidHwm {
        topic: String,
        requested: Offset,
        current: Offset,
        next_offset: Offset,
    },

    #[error("cannot truncate topic {topic:?} to {requested}: would discard committed offset below hwm {hwm}")]
    TruncateBelowHwm {
        topic: String,
        requested: Offset,
        hwm: Offset,
    },

    #[error("operation rejected: epoch {supplied} is stale (current epoch is {current})")]
    EpochStale { supplied: u64, current: u64 },

    #[error("storage I/O error for topic {topic:?}: {source}")]
    Storage {
        topic: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in log for topic {topic:?}: {source}")]
    Corrupt {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
