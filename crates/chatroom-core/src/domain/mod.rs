//! Domain entities for the chatroom hub.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from network libraries, sockets, or async runtimes.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! For the hub the domain is small: *who* is talking ([`Identity`]), *what*
//! they said ([`OutboundMessage`]), and *how* the hub is tuned ([`HubConfig`]).

/// Hub tuning knobs: queue capacity, timeouts, echo and announcement options.
pub mod config;

/// Display identities and the identity-verifier seam.
pub mod identity;

/// The immutable message envelope queued for broadcast.
pub mod message;

pub use config::{ConfigError, HubConfig, MAX_QUEUE_CAPACITY};
pub use identity::{AllowAnonymous, ConnectionId, Identity, IdentityVerifier, VerifyError, ANONYMOUS_LABEL};
pub use message::{MessageKind, OutboundMessage, WireFormat};
