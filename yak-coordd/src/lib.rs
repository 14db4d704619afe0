//! Library surface for `yak-coordd`, split out from `main.rs` so
//! integration tests can drive the real router over a real socket
//! instead of only through `tower::ServiceExt::oneshot`.

pub mod http;
pub mod store;
