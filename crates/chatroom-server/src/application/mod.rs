//! Application layer for chatroom-server.
//!
//! Token issuance and verification.  Knows nothing about sockets: the
//! routes in `infrastructure` verify through the core's
//! [`IdentityVerifier`](chatroom_core::IdentityVerifier) trait and sign
//! through [`JwtAuthority::issue`].

pub mod auth;

pub use auth::{AuthError, Claims, JwtAuthority};
