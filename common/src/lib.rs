//! Shared wire protocol, configuration, and error types for the Name
//! Server, Storage Server, and client binaries.

pub mod config;
pub mod error;
pub mod protocol;
pub mod time;
pub mod wire;

pub use error::ErrCode;
pub use protocol::{Reply, Request};
