//! File-backed append-only log storage for YAK brokers: one
//! [`FileTopicLog`] per topic, addressed through a [`TopicStore`]
//! registry keyed by topic name.

mod file_log;
mod registry;

pub use file_log::FileTopicLog;
pub use registry::TopicStore;
