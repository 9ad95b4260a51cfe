//! Recording transport doubles for unit and integration tests.
//!
//! Allows tests to observe every write the broadcaster performs and to feed
//! lines into a read loop without any socket.
//!
//! - [`RecordingSink`] records writes and close calls, and can be switched
//!   into a failing or stalled mode.  A stalled sink hangs on close too.
//! - [`ScriptedStream`] yields whatever its paired [`StreamFeeder`] pushes;
//!   dropping the feeder ends the stream like a peer hanging up.

use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Mutex,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{MessageSink, MessageStream, TransportError};

/// A [`MessageSink`] that records everything written to it.
#[derive(Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<String>>,
    close_count: AtomicU32,
    failing: AtomicBool,
    stalled: AtomicBool,
}

impl RecordingSink {
    /// Creates a sink that accepts every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink whose writes all fail.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    /// Makes subsequent writes fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes subsequent writes and close handshakes hang forever, as a peer
    /// with a full TCP window would.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Payloads successfully written so far, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().expect("lock poisoned").clone()
    }

    /// Number of times [`MessageSink::close`] was called.
    pub fn close_count(&self) -> u32 {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn write_message(&self, payload: &str) -> Result<(), TransportError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Io("injected write failure".to_string()));
        }
        self.writes
            .lock()
            .expect("lock poisoned")
            .push(payload.to_string());
        Ok(())
    }

    async fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

/// Test-side handle that drives a [`ScriptedStream`].
pub struct StreamFeeder {
    tx: mpsc::UnboundedSender<Result<String, TransportError>>,
}

impl StreamFeeder {
    /// Delivers `line` to the read loop as if the peer had sent it.
    pub fn send_line(&self, line: &str) {
        // The read loop may already have exited; that is not a test failure.
        let _ = self.tx.send(Ok(line.to_string()));
    }

    /// Makes the next read fail with `err`.
    pub fn fail(&self, err: TransportError) {
        let _ = self.tx.send(Err(err));
    }
}

/// A [`MessageStream`] fed by a [`StreamFeeder`].
pub struct ScriptedStream {
    rx: mpsc::UnboundedReceiver<Result<String, TransportError>>,
}

impl ScriptedStream {
    /// Creates a connected feeder/stream pair.
    pub fn channel() -> (StreamFeeder, ScriptedStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (StreamFeeder { tx }, ScriptedStream { rx })
    }
}

#[async_trait]
impl MessageStream for ScriptedStream {
    async fn read_message(&mut self) -> Result<Option<String>, TransportError> {
        match self.rx.recv().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}
