//! Shared types for the YAK broker cluster: the record/log domain model,
//! the wire protocol between producers/consumers/brokers, the error
//! taxonomy, and compiled-in configuration defaults.

pub mod config;
pub mod error;
pub mod fatal;
pub mod logging;
pub mod proto;
pub mod record;

pub use error::{Error, Result};
pub use fatal::FatalGuard;
pub use record::{LogEndEpoch, Offset, Record, TopicLogMeta};
