//! Coordination-store abstraction (spec.md §9): a narrow trait of four
//! primitives plus an in-memory and an HTTP-backed implementation, so
//! `yak-runtime`'s `LeaseManager` and `HeartbeatReporter` never depend on
//! a specific external product.

mod error;
mod http;
mod memory;
mod store;
pub mod types;

pub use error::{Error, Result};
pub use http::HttpCoordinationStore;
pub use memory::InMemoryCoordinationStore;
pub use store::CoordinationStore;
