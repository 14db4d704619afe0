//! The broker's HTTP surface and shared request state, split into a
//! library so integration tests can drive the router in-process without a
//! bound socket.

pub mod http;
pub mod state;
