//! chatroom-server: entry point.
//!
//! Serves the broadcast hub over WebSocket (tokens are also issued over HTTP
//! at `GET /token?username=NAME`), or issues a token for a user offline.
//!
//! # Usage
//!
//! ```text
//! chatroom-server [OPTIONS]                        run the server
//! chatroom-server token --username <NAME>          print a signed token
//!
//! Options:
//!   -c, --config <PATH>            TOML configuration file
//!       --jwt-secret <SECRET>      HS256 signing secret
//!       --token-ttl-secs <SECS>    lifetime of issued tokens
//!       --bind <IP>                listener IP address
//!       --port <PORT>              listener port
//!       --ws-path <PATH>           WebSocket path
//!       --require-auth <BOOL>      reject connections without a token
//!       --echo-to-sender <BOOL>    send chat lines back to their sender
//!       --announce-presence <BOOL> broadcast joined / left lines
//!       --wire-format <FORMAT>     text | json
//!       --queue-capacity <N>       broadcast queue size
//!       --log-level <FILTER>       log filter when RUST_LOG is unset
//! ```
//!
//! # Precedence
//!
//! Built-in defaults, then the configuration file, then CLI flags.  Every
//! flag can also be set through the environment variable shown below; the
//! flag wins when both are present.
//!
//! | Variable                     | Flag                   |
//! |------------------------------|------------------------|
//! | `CHATROOM_CONFIG`            | `--config`             |
//! | `CHATROOM_JWT_SECRET`        | `--jwt-secret`         |
//! | `CHATROOM_TOKEN_TTL_SECS`    | `--token-ttl-secs`     |
//! | `CHATROOM_BIND`              | `--bind`               |
//! | `CHATROOM_PORT`              | `--port`               |
//! | `CHATROOM_WS_PATH`           | `--ws-path`            |
//! | `CHATROOM_REQUIRE_AUTH`      | `--require-auth`       |
//! | `CHATROOM_ECHO_TO_SENDER`    | `--echo-to-sender`     |
//! | `CHATROOM_ANNOUNCE_PRESENCE` | `--announce-presence`  |
//! | `CHATROOM_WIRE_FORMAT`       | `--wire-format`        |
//! | `CHATROOM_QUEUE_CAPACITY`    | `--queue-capacity`     |
//! | `CHATROOM_LOG_LEVEL`         | `--log-level`          |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chatroom_core::{Hub, WireFormat};
use chatroom_server::application::JwtAuthority;
use chatroom_server::domain::ServerConfig;
use chatroom_server::infrastructure::{load_config, run_server, ConfigFile};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Real-time chat broadcast server.
#[derive(Debug, Parser)]
#[command(
    name = "chatroom-server",
    about = "WebSocket chat server that broadcasts every message to every client",
    version
)]
struct Cli {
    /// TOML configuration file.  Without one, built-in defaults apply.
    #[arg(short, long, global = true, env = "CHATROOM_CONFIG")]
    config: Option<PathBuf>,

    /// HS256 secret for signing and verifying tokens.
    #[arg(long, global = true, env = "CHATROOM_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Lifetime of issued tokens in seconds.
    #[arg(long, global = true, env = "CHATROOM_TOKEN_TTL_SECS")]
    token_ttl_secs: Option<u64>,

    /// IP address to bind.  `0.0.0.0` accepts connections on every interface.
    #[arg(long, env = "CHATROOM_BIND")]
    bind: Option<IpAddr>,

    /// TCP port to listen on.
    #[arg(long, env = "CHATROOM_PORT")]
    port: Option<u16>,

    /// Request path that is upgraded to WebSocket.
    #[arg(long, env = "CHATROOM_WS_PATH")]
    ws_path: Option<String>,

    /// Reject connections that present no token.
    #[arg(long, env = "CHATROOM_REQUIRE_AUTH")]
    require_auth: Option<bool>,

    /// Deliver each chat line back to its sender too.
    #[arg(long, env = "CHATROOM_ECHO_TO_SENDER")]
    echo_to_sender: Option<bool>,

    /// Broadcast "joined" / "left" lines.
    #[arg(long, env = "CHATROOM_ANNOUNCE_PRESENCE")]
    announce_presence: Option<bool>,

    /// Wire encoding.  `json` changes the wire contract for existing clients.
    #[arg(long, value_enum, env = "CHATROOM_WIRE_FORMAT")]
    wire_format: Option<WireFormatArg>,

    /// Maximum number of messages waiting for delivery.
    #[arg(long, env = "CHATROOM_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Log filter used when `RUST_LOG` is unset (e.g. `info`, `debug`).
    #[arg(long, env = "CHATROOM_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a signed token for USERNAME and exit.
    Token {
        /// Display name carried by the token.
        #[arg(long)]
        username: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WireFormatArg {
    Text,
    Json,
}

impl From<WireFormatArg> for WireFormat {
    fn from(arg: WireFormatArg) -> Self {
        match arg {
            WireFormatArg::Text => WireFormat::Text,
            WireFormatArg::Json => WireFormat::Json,
        }
    }
}

impl Cli {
    /// Builds the final [`ServerConfig`]: defaults, then the file, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// merged result fails validation.
    fn into_server_config(&self) -> anyhow::Result<ServerConfig> {
        let file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ConfigFile::default(),
        };
        let mut config = file.into_server_config()?;

        if let Some(secret) = &self.jwt_secret {
            config.jwt_secret = secret.clone();
        }
        if let Some(secs) = self.token_ttl_secs {
            config.token_ttl = Duration::from_secs(secs);
        }
        if let Some(ip) = self.bind {
            config.bind_addr = SocketAddr::new(ip, config.bind_addr.port());
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(path) = &self.ws_path {
            config.ws_path = path.clone();
        }
        if let Some(require_auth) = self.require_auth {
            config.require_auth = require_auth;
        }
        if let Some(echo) = self.echo_to_sender {
            config.hub.echo_to_sender = echo;
        }
        if let Some(announce) = self.announce_presence {
            config.hub.announce_presence = announce;
        }
        if let Some(format) = self.wire_format {
            config.hub.wire_format = format.into();
        }
        if let Some(capacity) = self.queue_capacity {
            config.hub.queue_capacity = capacity;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn authority(config: &ServerConfig) -> JwtAuthority {
    let authority = JwtAuthority::new(&config.jwt_secret, config.token_ttl);
    if config.require_auth {
        authority
    } else {
        authority.allowing_anonymous()
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_server_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    if let Some(Command::Token { username }) = &cli.command {
        let token = authority(&config)
            .issue(username)
            .context("failed to issue token")?;
        println!("{token}");
        return Ok(());
    }

    if config.uses_dev_secret() {
        warn!("authentication is on but the built-in development JWT secret is in use; set CHATROOM_JWT_SECRET");
    }
    if config.hub.wire_format == WireFormat::Json {
        info!("wire format is json; plain-text clients will not understand it");
    }

    info!(
        bind = %config.bind_addr,
        path = %config.ws_path,
        require_auth = config.require_auth,
        echo_to_sender = config.hub.echo_to_sender,
        announce_presence = config.hub.announce_presence,
        queue_capacity = config.hub.queue_capacity,
        "chat server starting"
    );

    let (hub, _broadcaster) = Hub::start(&config.hub)?;
    let auth = Arc::new(authority(&config));

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(
        config.bind_addr,
        Arc::clone(&hub),
        auth,
        config.ws_path.clone(),
        running,
    )
    .await?;

    info!(connections = hub.registry().len(), "chat server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
