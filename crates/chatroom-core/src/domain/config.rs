//! Hub configuration types.
//!
//! [`HubConfig`] holds every knob the registry/broadcaster core reads at
//! runtime.  It is a plain struct: the server crate fills it from a TOML file
//! and CLI flags, tests build it inline with struct-update syntax.
//!
//! # Queue policy
//!
//! The broadcast queue is bounded.  When it is full a producer waits up to
//! `enqueue_timeout` for room; after that the publish fails with
//! `PublishError::QueueFull` so the caller can report the drop instead of
//! losing the message silently.

use std::time::Duration;

use thiserror::Error;

use super::message::WireFormat;

/// Largest accepted [`HubConfig::queue_capacity`].
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

/// Invalid configuration values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A bounded channel needs room for at least one message.
    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    /// The channel cannot be created with this many slots.
    #[error("queue capacity {requested} exceeds the maximum of {max}")]
    QueueCapacityTooLarge { requested: usize, max: usize },

    /// A zero enqueue timeout would turn every momentary burst into a drop.
    #[error("enqueue timeout must be greater than zero")]
    ZeroEnqueueTimeout,
}

/// All runtime configuration for the broadcast core.
///
/// # Example
///
/// ```rust
/// use chatroom_core::domain::HubConfig;
///
/// let cfg = HubConfig { echo_to_sender: false, ..HubConfig::default() };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Maximum number of messages waiting for the broadcaster.
    pub queue_capacity: usize,

    /// How long a producer waits for queue space before giving up.
    pub enqueue_timeout: Duration,

    /// Upper bound on a single connection write.  A write that takes longer
    /// counts as a write failure and the peer is dropped.  `None` waits
    /// forever, so one hung peer stalls delivery to everyone.
    pub write_timeout: Option<Duration>,

    /// Whether the sender receives its own chat lines (and its own join
    /// announcement) back.
    pub echo_to_sender: bool,

    /// Whether "joined" / "left" announcements are broadcast at all.
    pub announce_presence: bool,

    /// Encoding used when writing messages to connections.
    pub wire_format: WireFormat,
}

impl Default for HubConfig {
    /// | Field             | Default   |
    /// |-------------------|-----------|
    /// | queue_capacity    | 256       |
    /// | enqueue_timeout   | 5 seconds |
    /// | write_timeout     | 10 seconds|
    /// | echo_to_sender    | `true`    |
    /// | announce_presence | `true`    |
    /// | wire_format       | `Text`    |
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            enqueue_timeout: Duration::from_secs(5),
            write_timeout: Some(Duration::from_secs(10)),
            echo_to_sender: true,
            announce_presence: true,
            wire_format: WireFormat::Text,
        }
    }
}

impl HubConfig {
    /// Checks the values the core cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a queue capacity outside
    /// `1..=MAX_QUEUE_CAPACITY` or a zero enqueue timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::QueueCapacityTooLarge {
                requested: self.queue_capacity,
                max: MAX_QUEUE_CAPACITY,
            });
        }
        if self.enqueue_timeout.is_zero() {
            return Err(ConfigError::ZeroEnqueueTimeout);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
