//! HTTP + WebSocket server: routing, handshake and token issuance.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Routing requests on that one listener:
//!    - the configured WebSocket path is upgraded once the `token` query
//!      parameter verifies (else 401, before any upgrade);
//!    - [`TOKEN_PATH`] signs a token for the `username` query parameter;
//!    - every other path gets a 404.
//! 3. Handing each upgraded connection to
//!    [`Hub::on_connection_established`], which registers it and starts its
//!    read loop.
//! 4. Stopping when the `running` flag is cleared.
//!
//! ```text
//! GET /ws?token=<JWT>      ──► verify ──► 101 ──► Hub::on_connection_established
//!                                │
//!                                └─ bad/missing token: 401
//! GET /token?username=<U>  ──► 200 <JWT> | 400 no username | 500 signing failed
//! anything else            ──► 404
//! ```

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use chatroom_core::{Hub, Identity, IdentityVerifier, MessageSink, VerifyError};

use crate::application::auth::{AuthError, JwtAuthority};
use crate::domain::TOKEN_PATH;
use crate::infrastructure::ws_transport::{WsSink, WsStream};

/// How often the server checks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    hub: Arc<Hub>,
    auth: Arc<JwtAuthority>,
}

/// Query string of the WebSocket upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Query string of the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub username: String,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the listener.
///
/// # Errors
///
/// Returns an error if the address is in use or cannot be bound.
pub async fn bind(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listener on {addr}"))?;
    info!("chat server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Builds the router: the WebSocket path, [`TOKEN_PATH`] and a 404 fallback.
///
/// `ws_path` must already be validated (see `ServerConfig::validate`).
pub fn router(hub: Arc<Hub>, auth: Arc<JwtAuthority>, ws_path: &str) -> Router {
    Router::new()
        .route(ws_path, get(ws_upgrade))
        .route(TOKEN_PATH, get(issue_token))
        .fallback(not_found)
        .with_state(AppState { hub, auth })
}

/// Serves `listener` until `running` is set to `false`.
///
/// Each connection is driven on its own task, so a slow handshake never
/// holds up the next accept.
///
/// # Parameters
///
/// - `hub`     – Shared hub every connection joins.
/// - `auth`    – Verifies upgrade tokens and signs new ones.
/// - `ws_path` – The only path that is upgraded.
/// - `running` – Shared flag; the server stops accepting once it is `false`.
///
/// # Errors
///
/// Returns an error if the listener fails irrecoverably.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<Hub>,
    auth: Arc<JwtAuthority>,
    ws_path: String,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let app = router(hub, auth, &ws_path);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown(running))
    .await
    .context("HTTP server failed")
}

/// Binds `addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    addr: SocketAddr,
    hub: Arc<Hub>,
    auth: Arc<JwtAuthority>,
    ws_path: String,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = bind(addr).await?;
    serve(listener, hub, auth, ws_path, running).await
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET <ws_path>?token=JWT
///
/// Verifies before upgrading, so a rejected client gets a plain 401 and never
/// reaches the hub.
async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match state.auth.verify(params.token.as_deref()) {
        Ok(identity) => identity,
        Err(e) => {
            warn!("rejecting {peer_addr}: {e}");
            return (StatusCode::UNAUTHORIZED, unauthorized_reason(&e)).into_response();
        }
    };

    ws.on_upgrade(move |socket| async move {
        if let Err(e) = establish(socket, peer_addr, state.hub, identity).await {
            warn!("connection {peer_addr} not established: {e:#}");
        }
    })
}

/// GET /token?username=NAME
async fn issue_token(State(state): State<AppState>, Query(params): Query<TokenQuery>) -> Response {
    match state.auth.issue(&params.username) {
        Ok(token) => (StatusCode::OK, token).into_response(),
        Err(AuthError::EmptyUsername) => {
            (StatusCode::BAD_REQUEST, "Username is required").into_response()
        }
        Err(e) => {
            error!("token signing failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate token").into_response()
        }
    }
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// Hands the upgraded socket to the hub.
async fn establish(
    socket: WebSocket,
    peer_addr: SocketAddr,
    hub: Arc<Hub>,
    identity: Identity,
) -> anyhow::Result<()> {
    let (tx, rx) = socket.split();
    let sink: Arc<dyn MessageSink> = Arc::new(WsSink::new(tx));
    let handle = hub
        .on_connection_established(sink, WsStream::new(rx), identity)
        .await
        .with_context(|| format!("failed to register {peer_addr}"))?;

    info!(
        connection = %handle.id(),
        identity = %handle.identity(),
        "{peer_addr} connected"
    );
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Resolves once `running` has been cleared.
async fn wait_for_shutdown(running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(SHUTDOWN_POLL).await;
    }
    info!("shutdown flag set; no longer accepting connections");
}

fn unauthorized_reason(e: &VerifyError) -> &'static str {
    match e {
        VerifyError::Missing => "Unauthorized: missing token",
        VerifyError::Expired => "Unauthorized: token expired",
        VerifyError::Invalid(_) => "Unauthorized",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
