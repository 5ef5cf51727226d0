//! Taskboard client: the HTTP remote authority, configuration and logging
//! around `taskboard-core`.
pub mod config;
pub mod http;
pub mod log_bridge;
mod wire;

pub use http::{ClientError, HttpAuthority};
