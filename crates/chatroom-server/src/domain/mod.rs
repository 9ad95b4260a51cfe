//! Domain layer for chatroom-server.
//!
//! Plain configuration types with no I/O.  Reading files, environment
//! variables and CLI flags happens in `infrastructure` and `main.rs`.

pub mod config;

pub use config::{ServerConfig, ServerConfigError, DEV_JWT_SECRET, TOKEN_PATH};
