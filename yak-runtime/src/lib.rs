//! Background control loops for a YAK broker: lease-based leader
//! election, heartbeating, and the leader/follower halves of the
//! replication protocol (spec.md §4.2–§4.4, §4.6).

mod coordinator;
mod error;
mod heartbeat;
mod lease;
mod peer_client;
mod worker;

pub use coordinator::ReplicationCoordinator;
pub use error::{LeaseError, ReplicationError};
pub use heartbeat::HeartbeatReporter;
pub use lease::{LeaseManager, Role, RoleSnapshot, StepDown};
pub use peer_client::{PeerClient, PushOutcome};
pub use worker::ReplicationWorker;
