//! TOML configuration file for the chat server.
//!
//! Every field is optional; anything missing takes its default, so an empty
//! file (or no file at all) yields [`ServerConfig::default`].
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8080
//! ws_path = "/ws"
//! log_level = "info"
//!
//! [auth]
//! require_auth = true
//! jwt_secret = "change-me"
//! token_ttl_secs = 3600
//!
//! [hub]
//! queue_capacity = 256
//! enqueue_timeout_ms = 5000
//! write_timeout_ms = 10000   # 0 disables the write timeout
//! echo_to_sender = true
//! announce_presence = true
//! wire_format = "text"       # or "json"
//! ```
//!
//! Unknown keys are rejected so a typo does not silently fall back to a
//! default.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chatroom_core::{HubConfig, WireFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{ServerConfig, DEV_JWT_SECRET};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level layout of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub auth: AuthSection,
    pub hub: HubSection,
}

/// Listener and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    pub bind_address: String,
    pub port: u16,
    pub ws_path: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

/// Token settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSection {
    pub require_auth: bool,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
}

/// Broadcast core settings; maps onto [`HubConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HubSection {
    pub queue_capacity: usize,
    pub enqueue_timeout_ms: u64,
    /// `0` means no write timeout.
    pub write_timeout_ms: u64,
    pub echo_to_sender: bool,
    pub announce_presence: bool,
    pub wire_format: WireFormat,
}

impl Default for ServerSection {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind_address: defaults.bind_addr.ip().to_string(),
            port: defaults.bind_addr.port(),
            ws_path: defaults.ws_path,
            log_level: defaults.log_level,
        }
    }
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            require_auth: true,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_secs: 60 * 60,
        }
    }
}

impl Default for HubSection {
    fn default() -> Self {
        let defaults = HubConfig::default();
        Self {
            queue_capacity: defaults.queue_capacity,
            enqueue_timeout_ms: millis(defaults.enqueue_timeout),
            write_timeout_ms: defaults.write_timeout.map(millis).unwrap_or(0),
            echo_to_sender: defaults.echo_to_sender,
            announce_presence: defaults.announce_presence,
            wire_format: defaults.wire_format,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl ConfigFile {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::Parse`] for malformed TOML, wrong types or
    /// unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigFileError> {
        Ok(toml::from_str(content)?)
    }

    /// Converts the file representation into the runtime [`ServerConfig`].
    ///
    /// Does not run [`ServerConfig::validate`]; CLI overrides are applied
    /// first and the caller validates the final result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::InvalidBindAddress`] when `bind_address`
    /// is not an IP address.
    pub fn into_server_config(self) -> Result<ServerConfig, ConfigFileError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigFileError::InvalidBindAddress(self.server.bind_address.clone()))?;

        let write_timeout = match self.hub.write_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(ServerConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            ws_path: self.server.ws_path,
            jwt_secret: self.auth.jwt_secret,
            token_ttl: Duration::from_secs(self.auth.token_ttl_secs),
            require_auth: self.auth.require_auth,
            log_level: self.server.log_level,
            hub: HubConfig {
                queue_capacity: self.hub.queue_capacity,
                enqueue_timeout: Duration::from_millis(self.hub.enqueue_timeout_ms),
                write_timeout,
                echo_to_sender: self.hub.echo_to_sender,
                announce_presence: self.hub.announce_presence,
                wire_format: self.hub.wire_format,
            },
        })
    }
}

/// Loads a configuration file from `path`.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] if the file cannot be read (including when
/// it does not exist: an explicitly named file must be present) and
/// [`ConfigFileError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigFile::from_toml_str(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
