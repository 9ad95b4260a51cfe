//! The message envelope queued for broadcast.
//!
//! Every event the hub fans out (a client joined, a client left, a client
//! said something) is captured as one [`OutboundMessage`].  The envelope is
//! structured (kind, sender, text, origin, timestamp) and immutable once
//! built; it is turned into bytes only at delivery time by
//! [`OutboundMessage::render`].
//!
//! # Wire formats
//!
//! Two renderings are supported, selected by [`WireFormat`]:
//!
//! ```text
//! Text (default, human-readable lines):
//!     🔵 alice joined the chat
//!     💬 alice: hi
//!     ❌ alice left the chat
//!
//! Json (structured envelope):
//!     {"type":"chat","sender":"alice","text":"hi","sent_at":1700000000000}
//! ```
//!
//! `Text` is what existing clients understand.  Switching a deployment to
//! `Json` changes the wire contract and breaks those clients; it is an
//! explicit opt-in, never a silent default.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::identity::{ConnectionId, Identity};

/// How an [`OutboundMessage`] is encoded on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// One human-readable line per message with an emoji prefix.
    #[default]
    Text,
    /// A JSON object with `type`, `sender`, `text` and `sent_at` fields.
    Json,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A connection became active.
    Joined,
    /// A connection closed after a read failure or disconnect.
    Left,
    /// A connection sent a line of text.
    Chat,
}

/// An immutable, fully described broadcast payload.
///
/// Produced by the per-connection read loop or by a join/leave transition,
/// consumed exactly once by the broadcaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    kind: MessageKind,
    sender: Identity,
    text: String,
    origin: Option<ConnectionId>,
    sent_at_ms: u64,
}

/// JSON shape of the structured envelope.
#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: MessageKind,
    sender: &'a str,
    text: &'a str,
    sent_at: u64,
}

impl OutboundMessage {
    fn new(kind: MessageKind, origin: Option<ConnectionId>, sender: Identity, text: String) -> Self {
        let sent_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            kind,
            sender,
            text,
            origin,
            sent_at_ms,
        }
    }

    /// A "`sender` joined the chat" announcement.
    pub fn joined(origin: ConnectionId, sender: Identity) -> Self {
        Self::new(MessageKind::Joined, Some(origin), sender, String::new())
    }

    /// A "`sender` left the chat" announcement.
    pub fn left(origin: ConnectionId, sender: Identity) -> Self {
        Self::new(MessageKind::Left, Some(origin), sender, String::new())
    }

    /// A chat line sent by the connection `origin`.
    pub fn chat(origin: ConnectionId, sender: Identity, text: impl Into<String>) -> Self {
        Self::new(MessageKind::Chat, Some(origin), sender, text.into())
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn sender(&self) -> &Identity {
        &self.sender
    }

    /// The chat text; empty for join/leave announcements.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The connection this message is about, used to suppress self-delivery.
    pub fn origin(&self) -> Option<ConnectionId> {
        self.origin
    }

    /// Milliseconds since the Unix epoch at construction time.
    pub fn sent_at_ms(&self) -> u64 {
        self.sent_at_ms
    }

    /// Encodes the message for the wire.
    ///
    /// # Example
    ///
    /// ```rust
    /// use chatroom_core::domain::{Identity, OutboundMessage, WireFormat};
    /// use uuid::Uuid;
    ///
    /// let msg = OutboundMessage::chat(Uuid::new_v4(), Identity::new("alice"), "hi");
    /// assert_eq!(msg.render(WireFormat::Text), "💬 alice: hi");
    /// ```
    pub fn render(&self, format: WireFormat) -> String {
        let sender = self.sender.display_label();
        match format {
            WireFormat::Text => match self.kind {
                MessageKind::Joined => format!("🔵 {sender} joined the chat"),
                MessageKind::Left => format!("❌ {sender} left the chat"),
                MessageKind::Chat => format!("💬 {sender}: {}", self.text),
            },
            WireFormat::Json => {
                let envelope = Envelope {
                    kind: self.kind,
                    sender,
                    text: &self.text,
                    sent_at: self.sent_at_ms,
                };
                // Serializing a struct of strings and integers cannot fail.
                serde_json::to_string(&envelope).unwrap_or_default()
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
