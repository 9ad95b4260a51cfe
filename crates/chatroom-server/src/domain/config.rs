//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for the process's runtime
//! settings.  It is built once at startup (defaults, then the optional TOML
//! file, then CLI flags) and shared read-only afterwards.  The hub-specific
//! knobs live in the embedded [`HubConfig`].

use std::net::SocketAddr;
use std::time::Duration;

use chatroom_core::{ConfigError, HubConfig};
use thiserror::Error;

/// Signing secret used when nothing else is configured.
///
/// Fine for local development only; startup warns when it is used with
/// authentication switched on.
pub const DEV_JWT_SECRET: &str = "chatroom-development-secret";

/// Path of the token issuance endpoint, served next to the WebSocket path.
pub const TOKEN_PATH: &str = "/token";

/// Errors from [`ServerConfig::validate`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServerConfigError {
    #[error("jwt secret must not be empty")]
    EmptySecret,

    #[error("websocket path must be a literal path starting with '/', got {0:?}")]
    InvalidPath(String),

    #[error("websocket path {0:?} is reserved for token issuance")]
    ReservedPath(String),

    #[error("token ttl must be greater than zero")]
    ZeroTokenTtl,

    #[error(transparent)]
    Hub(#[from] ConfigError),
}

/// All runtime configuration for the chat server.
///
/// # Example
///
/// ```rust
/// use chatroom_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8080);
/// assert_eq!(cfg.ws_path, "/ws");
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// The only request path that is upgraded.  Apart from [`TOKEN_PATH`],
    /// every other path gets a 404.
    pub ws_path: String,

    /// HS256 signing secret shared by token issuance and verification.
    pub jwt_secret: String,

    /// Lifetime of issued tokens.
    pub token_ttl: Duration,

    /// When `false`, connections without a token are admitted as anonymous.
    /// A token that *is* presented is still verified.
    pub require_auth: bool,

    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Queue, timeout and rendering settings for the hub.
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    /// | Field        | Default            |
    /// |--------------|--------------------|
    /// | bind_addr    | `0.0.0.0:8080`     |
    /// | ws_path      | `/ws`              |
    /// | jwt_secret   | [`DEV_JWT_SECRET`] |
    /// | token_ttl    | 1 hour             |
    /// | require_auth | `true`             |
    /// | log_level    | `info`             |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            ws_path: "/ws".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl: Duration::from_secs(60 * 60),
            require_auth: true,
            log_level: "info".to_string(),
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Checks the invariants startup relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ServerConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ServerConfigError::EmptySecret);
        }
        // ':' and '*' would turn the route into a capture.
        if !self.ws_path.starts_with('/') || self.ws_path.contains([':', '*']) {
            return Err(ServerConfigError::InvalidPath(self.ws_path.clone()));
        }
        if self.ws_path == TOKEN_PATH {
            return Err(ServerConfigError::ReservedPath(self.ws_path.clone()));
        }
        if self.token_ttl.is_zero() {
            return Err(ServerConfigError::ZeroTokenTtl);
        }
        self.hub.validate()?;
        Ok(())
    }

    /// True when authentication is on but the secret was never changed.
    pub fn uses_dev_secret(&self) -> bool {
        self.require_auth && self.jwt_secret == DEV_JWT_SECRET
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
