//! # chatroom-core
//!
//! Connection registry and broadcast-delivery engine for the chatroom hub.
//!
//! Any number of clients hold a persistent connection; whatever one of them
//! sends is fanned out to every connected client.  This crate is the part of
//! that system with real concurrency in it.  It knows nothing about sockets,
//! HTTP or tokens: it consumes an already verified [`Identity`] and a pair of
//! transport halves ([`MessageSink`] / [`MessageStream`]).
//!
//! # Architecture overview (for beginners)
//!
//! - **`domain`** – Plain data: identities, the message envelope, the hub
//!   configuration.  No I/O.
//! - **`connection`** – The transport traits the core talks to, plus the
//!   shared [`ConnectionHandle`] that guarantees a connection is closed once.
//! - **`application`** – The [`Registry`] (who is connected), the
//!   [`Broadcaster`] (the one task that writes to connections) and the
//!   [`Hub`] (join, leave and the per-connection read loop).
//!
//! ```text
//! acceptor ──on_connection_established──► Hub ──join──► Registry
//!                                          │               ▲ snapshot / leave
//!                          read loop ──publish──► queue ──► Broadcaster ──► peers
//! ```

pub mod application;
pub mod connection;
pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `chatroom_core::Hub` instead of `chatroom_core::application::hub::Hub`.
pub use application::{
    Broadcaster, DeliveryReport, Hub, HubError, PublishError, Publisher, Registry, RegistryError,
};
pub use connection::{ConnectionHandle, MessageSink, MessageStream, TransportError};
pub use domain::{
    AllowAnonymous, ConfigError, ConnectionId, HubConfig, Identity, IdentityVerifier,
    MessageKind, OutboundMessage, VerifyError, WireFormat,
};
