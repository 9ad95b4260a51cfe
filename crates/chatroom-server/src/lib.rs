//! chatroom-server library crate.
//!
//! The network-facing half of the chatroom: it authenticates clients,
//! upgrades them to WebSocket and hands them to the broadcast hub in
//! `chatroom-core`.
//!
//! ```text
//! Client (GET /token?username=U, then ws://host:8080/ws?token=JWT)
//!         ↕
//! [chatroom-server]
//!   ├── domain/           ServerConfig
//!   ├── application/      JwtAuthority: issue + verify HS256 tokens
//!   └── infrastructure/
//!         ├── ws_server/     axum router: /token, upgrade checks (404 / 401)
//!         ├── ws_transport/  WebSocket ↔ MessageSink / MessageStream
//!         └── config_file/   TOML configuration
//!         ↕
//! [chatroom-core]  Registry + Broadcaster + Hub
//! ```

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: token issuance and verification.
pub mod application;

/// Infrastructure layer: HTTP/WebSocket server and configuration file.
pub mod infrastructure;
