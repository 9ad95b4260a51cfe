//! Infrastructure layer for chatroom-server.
//!
//! Everything that touches the outside world: the listener, its routes
//! (WebSocket upgrade and token issuance), the WebSocket adapters for the core's transport
//! traits, and the TOML configuration file.

pub mod config_file;
pub mod ws_server;
pub mod ws_transport;

pub use config_file::{load_config, ConfigFile, ConfigFileError};
pub use ws_server::{bind, router, run_server, serve};
pub use ws_transport::{WsSink, WsStream};
