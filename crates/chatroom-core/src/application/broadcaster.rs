//! Broadcaster: the single serialized delivery loop.
//!
//! ```text
//!  read loops ─┐
//!  join/leave ─┼──► [ bounded queue ] ──► Broadcaster ──► write to every
//!  publish()  ─┘                            (1 task)       registered peer
//! ```
//!
//! The broadcaster is the only task that writes to connections, so two
//! messages are never interleaved on one socket and every live connection
//! sees messages in dequeue order.
//!
//! # Fault isolation
//!
//! Writes are attempted one connection at a time.  A failed (or timed out)
//! write removes that one peer from the registry and closes it; delivery to
//! the remaining peers carries on and the loop itself never stops because of
//! a peer.  The same `write_timeout` bounds the close handshake of a dropped
//! peer, since a peer that stopped reading will not complete one either.
//! Without a `write_timeout` a hung peer stalls delivery to everyone behind
//! it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::registry::Registry;
use crate::domain::config::HubConfig;
use crate::domain::message::{OutboundMessage, WireFormat};

/// Outcome of delivering one message.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections that accepted the write.
    pub delivered: usize,
    /// Connections deliberately not written to (the sender, when echo is off).
    pub skipped: usize,
    /// Connections whose write failed and that were removed.
    pub failed: usize,
}

/// Consumer side of the broadcast queue.
pub struct Broadcaster {
    registry: Arc<Registry>,
    queue: mpsc::Receiver<OutboundMessage>,
    write_timeout: Option<Duration>,
    echo_to_sender: bool,
    wire_format: WireFormat,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<Registry>,
        queue: mpsc::Receiver<OutboundMessage>,
        config: &HubConfig,
    ) -> Self {
        Self {
            registry,
            queue,
            write_timeout: config.write_timeout,
            echo_to_sender: config.echo_to_sender,
            wire_format: config.wire_format,
        }
    }

    /// Drains the queue until every [`Publisher`](super::queue::Publisher)
    /// has been dropped.
    ///
    /// Meant to be spawned once per process:
    ///
    /// ```rust,ignore
    /// tokio::spawn(broadcaster.run());
    /// ```
    pub async fn run(mut self) {
        info!("broadcaster started");
        while let Some(message) = self.queue.recv().await {
            let report = self.deliver(&message).await;
            debug!(
                kind = ?message.kind(),
                sender = %message.sender(),
                delivered = report.delivered,
                skipped = report.skipped,
                failed = report.failed,
                "message delivered"
            );
        }
        info!("broadcast queue closed; broadcaster stopping");
    }

    /// Writes `message` to every connection currently registered.
    pub async fn deliver(&self, message: &OutboundMessage) -> DeliveryReport {
        // Encode once, not once per recipient.
        let payload = message.render(self.wire_format);
        let mut report = DeliveryReport::default();

        // The snapshot is a copy: the registry lock is released before the
        // first write starts.
        for connection in self.registry.snapshot() {
            if !self.echo_to_sender && message.origin() == Some(connection.id()) {
                report.skipped += 1;
                continue;
            }

            match connection.write(&payload, self.write_timeout).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        connection = %connection.id(),
                        identity = %connection.identity(),
                        error = %e,
                        "write failed; dropping peer"
                    );
                    self.registry.leave(connection.id());
                    connection.close_within(self.write_timeout).await;
                }
            }
        }

        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
