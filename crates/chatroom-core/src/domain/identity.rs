//! Display identities attached to connections.
//!
//! An [`Identity`] is the human-readable label other clients see next to a
//! message ("alice").  It is produced by an [`IdentityVerifier`] before the
//! connection ever reaches the registry, and it may be empty when the
//! deployment does not authenticate its clients at all.
//!
//! The core never parses credentials itself.  It only asks a verifier for a
//! verdict, so the JWT implementation can live in the server crate while the
//! tests plug in [`AllowAnonymous`] or a hand-written double.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Unique handle of one open connection; the registry key.
///
/// A fresh UUID v4 is generated for every accepted connection, so two
/// handles never collide in practice.
pub type ConnectionId = Uuid;

/// Label rendered in announcements and chat lines for connections that have
/// no identity.
pub const ANONYMOUS_LABEL: &str = "anonymous";

/// The display identity of a connection.
///
/// Wraps an optional label.  An empty or whitespace-only label is normalised
/// to "no identity" so the registry never stores a blank name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity(Option<String>);

impl Identity {
    /// Creates an identity from a verified label.
    ///
    /// Surrounding whitespace is trimmed; a label that is empty after trimming
    /// yields [`Identity::anonymous`].
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let trimmed = label.trim();
        if trimmed.is_empty() {
            Self(None)
        } else {
            Self(Some(trimmed.to_string()))
        }
    }

    /// The identity of an unauthenticated connection.
    pub fn anonymous() -> Self {
        Self(None)
    }

    /// Returns `true` if no label was supplied.
    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }

    /// The raw label, if any.
    pub fn label(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// The label shown to other clients; [`ANONYMOUS_LABEL`] when empty.
    pub fn display_label(&self) -> &str {
        self.0.as_deref().unwrap_or(ANONYMOUS_LABEL)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_label())
    }
}

impl From<&str> for Identity {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Identity {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

// ── Verification seam ─────────────────────────────────────────────────────────

/// Reasons a credential was refused.
///
/// Every variant means "reject before join": the acceptor answers the
/// handshake with a rejection and the connection never becomes active.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// No credential was presented but the verifier requires one.
    #[error("missing credential")]
    Missing,

    /// The credential's validity period has passed.
    #[error("credential expired")]
    Expired,

    /// The credential was malformed, had a bad signature, or carried no
    /// usable identity claim.
    #[error("invalid credential: {0}")]
    Invalid(String),
}

/// Turns a bearer credential into a verified [`Identity`].
///
/// Implementations must be cheap to share (`Send + Sync`) because the
/// acceptor calls them from every connection task.
pub trait IdentityVerifier: Send + Sync {
    /// Verifies `credential` (the raw bearer string, or `None` if the client
    /// sent none).
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] describing why the connection must be refused.
    fn verify(&self, credential: Option<&str>) -> Result<Identity, VerifyError>;
}

/// Verifier for deployments that do not authenticate clients.
///
/// Every connection is accepted as anonymous.  Any credential is ignored: an
/// unverified string must never become a display label, or clients could
/// pose as each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAnonymous;

impl IdentityVerifier for AllowAnonymous {
    fn verify(&self, _credential: Option<&str>) -> Result<Identity, VerifyError> {
        Ok(Identity::anonymous())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
