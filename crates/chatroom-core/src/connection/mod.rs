//! Transport seam: what the core needs from a connection.
//!
//! The core never touches sockets.  A connection is split into two halves
//! that are owned by different tasks:
//!
//! - [`MessageSink`] – the write half plus `close`.  Shared (via
//!   [`ConnectionHandle`]) between the registry and the broadcaster, which is
//!   the only task that ever writes.
//! - [`MessageStream`] – the read half.  Owned exclusively by the
//!   connection's read loop.
//!
//! The server crate implements both traits over an axum
//! WebSocket; tests use the recording doubles in [`mock`].
//!
//! # Closing exactly once
//!
//! Both the read loop (peer hung up) and the broadcaster (write failed) may
//! decide a connection is dead, possibly at the same moment.
//! [`ConnectionHandle::close`] latches an `AtomicBool` so the underlying sink
//! is closed by whichever path gets there first and never again.  A second
//! latch, [`ConnectionHandle::mark_departed`], lets exactly one "left"
//! announcement go out per connection no matter which path dropped it.
//!
//! A peer that stops reading can hang the close handshake as well as writes,
//! so callers that must not stall use [`ConnectionHandle::close_within`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::domain::identity::{ConnectionId, Identity};

/// Recording test doubles for the transport traits.
pub mod mock;

/// Failures reported by a transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection was already closed.
    #[error("connection closed")]
    Closed,

    /// A write did not complete within the configured bound.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    /// Any other transport failure (I/O error, protocol violation, …).
    #[error("transport error: {0}")]
    Io(String),
}

/// Write half of a connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Writes one complete message.
    async fn write_message(&self, payload: &str) -> Result<(), TransportError>;

    /// Closes the underlying transport.  Errors are swallowed: the peer is
    /// gone either way.
    async fn close(&self);
}

/// Read half of a connection.
#[async_trait]
pub trait MessageStream: Send {
    /// Reads the next text message.
    ///
    /// Returns `Ok(None)` when the peer ended the stream in an orderly way.
    async fn read_message(&mut self) -> Result<Option<String>, TransportError>;
}

/// A registered connection: handle id, display identity and the write half.
///
/// Always used behind an `Arc` so the registry, the broadcaster and the read
/// loop can share it for the connection's lifetime.
pub struct ConnectionHandle {
    id: ConnectionId,
    identity: Identity,
    sink: Arc<dyn MessageSink>,
    closed: AtomicBool,
    departed: AtomicBool,
    close_notify: Notify,
}

impl ConnectionHandle {
    /// Wraps `sink` under a freshly generated handle id.
    pub fn new(identity: Identity, sink: Arc<dyn MessageSink>) -> Self {
        Self::with_id(Uuid::new_v4(), identity, sink)
    }

    /// Wraps `sink` under an explicit handle id.
    pub fn with_id(id: ConnectionId, identity: Identity, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            id,
            identity,
            sink,
            closed: AtomicBool::new(false),
            departed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Writes `payload`, bounded by `limit` when one is given.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Closed`] if the handle was already closed.
    /// - [`TransportError::Timeout`] if `limit` elapsed first.
    /// - Whatever the sink reports otherwise.
    pub async fn write(&self, payload: &str, limit: Option<Duration>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        match limit {
            Some(limit) => tokio::time::timeout(limit, self.sink.write_message(payload))
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => self.sink.write_message(payload).await,
        }
    }

    /// Closes the underlying sink if nobody has done so yet.
    ///
    /// Returns `true` for the call that actually closed it, `false` for every
    /// later call.
    pub async fn close(&self) -> bool {
        self.close_within(None).await
    }

    /// Like [`close`](Self::close), but gives up on the sink's close
    /// handshake once `limit` elapses.
    ///
    /// The handle is marked closed and `closed()` waiters are woken before
    /// the sink is touched, so an abandoned handshake still counts as closed.
    pub async fn close_within(&self, limit: Option<Duration>) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.close_notify.notify_waiters();
        match limit {
            Some(limit) => {
                if tokio::time::timeout(limit, self.sink.close()).await.is_err() {
                    debug!(connection = %self.id, "close handshake abandoned after {limit:?}");
                }
            }
            None => self.sink.close().await,
        }
        true
    }

    /// Claims the connection's departure.
    ///
    /// Returns `true` for the first caller only; whoever gets `true` owns the
    /// "left" announcement.
    pub fn mark_departed(&self) -> bool {
        !self.departed.swap(true, Ordering::AcqRel)
    }

    /// Resolves once the handle has been closed by any path.
    ///
    /// The read loop races this against its pending read so that a
    /// connection dropped by the broadcaster stops reading immediately.
    pub async fn closed(&self) {
        let notified = self.close_notify.notified();
        tokio::pin!(notified);
        // Register interest before checking the flag so a close that lands
        // in between is not missed.
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_calls_sink_exactly_once() {
        // Arrange: the mock fails the test if close() runs twice.
        let mut sink = MockMessageSink::new();
        sink.expect_close().times(1).returning(|| ());
        let handle = ConnectionHandle::new(Identity::new("alice"), Arc::new(sink));

        // Act
        let first = handle.close().await;
        let second = handle.close().await;

        // Assert
        assert!(first);
        assert!(!second);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_write_after_close_is_refused_without_touching_sink() {
        let mut sink = MockMessageSink::new();
        sink.expect_close().times(1).returning(|| ());
        sink.expect_write_message().never();
        let handle = ConnectionHandle::new(Identity::anonymous(), Arc::new(sink));

        handle.close().await;
        let result = handle.write("hello", None).await;

        assert_eq!(result, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn test_write_forwards_sink_error() {
        let mut sink = MockMessageSink::new();
        sink.expect_write_message()
            .times(1)
            .returning(|_| Err(TransportError::Io("broken pipe".to_string())));
        let handle = ConnectionHandle::new(Identity::anonymous(), Arc::new(sink));

        let result = handle.write("hello", Some(Duration::from_secs(1))).await;

        assert!(matches!(result, Err(TransportError::Io(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_write_times_out() {
        // Arrange: a sink that never finishes its write.
        let sink = mock::RecordingSink::new();
        sink.set_stalled(true);
        let handle = ConnectionHandle::new(Identity::anonymous(), Arc::new(sink));

        // Act
        let result = handle.write("hello", Some(Duration::from_millis(50))).await;

        // Assert
        assert_eq!(result, Err(TransportError::Timeout(Duration::from_millis(50))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_within_gives_up_on_hung_sink() {
        // Arrange: a sink whose close handshake never finishes.
        let sink = Arc::new(mock::RecordingSink::new());
        sink.set_stalled(true);
        let handle = ConnectionHandle::new(Identity::anonymous(), sink.clone());

        // Act
        let closed = tokio::time::timeout(
            Duration::from_secs(5),
            handle.close_within(Some(Duration::from_millis(50))),
        )
        .await
        .expect("bounded close must return");

        // Assert
        assert!(closed);
        assert!(handle.is_closed());
        assert_eq!(sink.close_count(), 1);
        assert!(!handle.close_within(Some(Duration::from_millis(50))).await);
    }

    #[test]
    fn test_departure_is_claimed_once() {
        let handle = ConnectionHandle::new(Identity::new("carol"), Arc::new(mock::RecordingSink::new()));

        assert!(handle.mark_departed());
        assert!(!handle.mark_departed());
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let handle = Arc::new(ConnectionHandle::new(
            Identity::anonymous(),
            Arc::new(mock::RecordingSink::new()),
        ));
        let waiter = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.closed().await })
        };

        handle.close().await;

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("closed() must resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_closed_returns_immediately_when_already_closed() {
        let handle = ConnectionHandle::new(Identity::anonymous(), Arc::new(mock::RecordingSink::new()));
        handle.close().await;
        tokio::time::timeout(Duration::from_secs(1), handle.closed())
            .await
            .expect("already closed");
    }

    #[test]
    fn test_debug_omits_sink() {
        let handle = ConnectionHandle::new(Identity::new("dbg"), Arc::new(mock::RecordingSink::new()));
        let text = format!("{handle:?}");
        assert!(text.contains("dbg"));
        assert!(text.contains("closed: false"));
    }
}
