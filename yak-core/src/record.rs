use serde::{Deserialize, Serialize};

/// A dense, zero-based position of a [`Record`] within its topic's log.
pub type Offset = u64;

/// A leadership term under which a record was appended. Monotonically
/// increasing across all brokers that ever held the lease.
pub type LogEndEpoch = u64;

/// An immutable record in a topic's log.
///
/// `epoch` is the leader epoch under which this record was first appended
/// (spec.md §3); it never changes once the record is written, even if a
/// later leader re-sends it verbatim during catch-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub offset: Offset,
    pub topic: String,
    /// Opaque to the broker; producers and consumers agree on the
    /// encoding between themselves.
    pub message: Vec<u8>,
    pub epoch: LogEndEpoch,
}

/// The metadata half of a [`crate::record`]'s parent topic log: the
/// bookkeeping the storage engine tracks in memory alongside the on-disk
/// record bytes.
///
/// Invariant: `0 <= hwm <= next_offset` always holds (spec.md §3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicLogMeta {
    pub next_offset: Offset,
    pub hwm: Offset,
    pub log_end_epoch: LogEndEpoch,
}

impl TopicLogMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently in the log.
    pub fn len(&self) -> Offset {
        self.next_offset
    }

    pub fn is_empty(&self) -> bool {
        self.next_offset == 0
    }

    /// Highest offset that is durably stored but not yet part of the
    /// committed, consumer-visible prefix.
    pub fn uncommitted_len(&self) -> Offset {
        self.next_offset - self.hwm
    }
}
