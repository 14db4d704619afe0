//! Compiled-in defaults from spec.md §6. CLI flags in `yak-broker`,
//! `yak-producer`, and `yak-consumer` may override any of these; nothing
//! here is read from a config file, since none is named by the spec.

use std::time::Duration;

/// How long a leader's claim on the cluster lease is valid for without
/// renewal before a follower may attempt to take over.
pub const LEASE_TTL: Duration = Duration::from_secs(10);

/// How often the current leader attempts to renew its lease. Must stay
/// well under `LEASE_TTL / 2` so at least one renewal can fail before the
/// lease actually expires.
pub const RENEW_INTERVAL: Duration = Duration::from_secs(3);

/// How often each broker publishes a heartbeat to the registry.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// How old a heartbeat may be before the broker is considered dead for
/// quorum purposes.
pub const HEARTBEAT_TTL: Duration = Duration::from_secs(6);

/// How often a `ReplicationWorker` polls the leader for new records once
/// it has caught up and entered steady state.
pub const REPLICATION_POLL: Duration = Duration::from_millis(200);

/// Upper bound on any single network operation (coordination store,
/// peer-to-peer replication, producer/consumer HTTP calls).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default port for the standalone reference coordination store
/// (`yak-coordd`).
pub const DEFAULT_COORD_PORT: u16 = 2379;

/// Partition directory name; YAK topics are always single-partition, but
/// the on-disk layout still carries a `partition-0` segment so that a
/// later multi-partition extension (explicitly out of scope, see spec.md
/// §1 Non-goals) would not require a migration.
pub const PARTITION_DIR: &str = "partition-0";

pub const LOG_FILE_NAME: &str = "messages.log";
pub const HWM_FILE_NAME: &str = "hwm";

/// Consecutive storage failures (`Error::Storage`/`Error::Corrupt`) a
/// broker tolerates before treating its log as unrecoverable and exiting
/// (spec.md §7). A single transient I/O error is retried like any other;
/// this many in a row without an intervening success is not.
pub const MAX_CONSECUTIVE_STORAGE_FAILURES: u32 = 5;
