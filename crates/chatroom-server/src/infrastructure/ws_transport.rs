//! Adapters from a split WebSocket to the core's transport traits.
//!
//! ```text
//! WebSocket ──split──► SplitSink   ──► WsSink   (MessageSink)
//!                  └─► SplitStream ──► WsStream (MessageStream)
//! ```
//!
//! Each chat line travels as one Text frame.  Binary frames are accepted and
//! decoded as lossy UTF-8; Ping/Pong are answered by the WebSocket layer and
//! skipped here.
//!
//! Both adapters are generic over any sink/stream of [`Message`]s so they can
//! be exercised without a socket.

use std::fmt::Display;

use async_trait::async_trait;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::Mutex;
use tracing::debug;

use chatroom_core::{MessageSink, MessageStream, TransportError};

/// Write half of a WebSocket connection.
///
/// The broadcaster writes and the read loop may close concurrently, so the
/// split sink sits behind an async mutex.
pub struct WsSink<T> {
    inner: Mutex<T>,
}

impl<T> WsSink<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

#[async_trait]
impl<T> MessageSink for WsSink<T>
where
    T: Sink<Message> + Unpin + Send + 'static,
    T::Error: Display + Send,
{
    async fn write_message(&self, payload: &str) -> Result<(), TransportError> {
        let mut sink = self.inner.lock().await;
        sink.send(Message::Text(payload.to_string()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&self) {
        let mut sink = self.inner.lock().await;
        // Sends a Close frame and flushes; the peer may already be gone.
        if let Err(e) = sink.close().await {
            debug!("websocket close: {e}");
        }
    }
}

/// Read half of a WebSocket connection.
pub struct WsStream<St> {
    inner: St,
}

impl<St> WsStream<St> {
    pub fn new(inner: St) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<St, E> MessageStream for WsStream<St>
where
    St: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send,
{
    async fn read_message(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    use chatroom_core::application::{broadcast_queue, Broadcaster, Registry};
    use chatroom_core::connection::mock::RecordingSink;
    use chatroom_core::{ConnectionHandle, HubConfig, Identity, OutboundMessage};
    use futures_util::stream;

    type BoxSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

    /// A sink that records every message it accepts.
    fn recording() -> (Arc<std::sync::Mutex<Vec<Message>>>, BoxSink) {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let sink = futures_util::sink::unfold((), move |(), message: Message| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(message);
                Ok::<_, axum::Error>(())
            }
        });
        (seen, Box::pin(sink))
    }

    /// A sink whose sends (and therefore flush and close) never complete,
    /// like a socket whose peer stopped reading.
    fn wedged() -> BoxSink {
        Box::pin(futures_util::sink::unfold((), |(), _message: Message| {
            futures_util::future::pending::<Result<(), axum::Error>>()
        }))
    }

    #[tokio::test]
    async fn test_sink_writes_text_frames() {
        // Arrange
        let (seen, inner) = recording();
        let sink = WsSink::new(inner);

        // Act
        sink.write_message("💬 alice: hi").await.unwrap();

        // Assert
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Message::Text("💬 alice: hi".to_string())]
        );
    }

    #[tokio::test]
    async fn test_stream_yields_text_and_lossy_binary() {
        let frames = vec![
            Ok::<_, axum::Error>(Message::Text("hello".to_string())),
            Ok(Message::Ping(vec![1, 2])),
            Ok(Message::Binary(b"bytes".to_vec())),
        ];
        let mut stream = WsStream::new(stream::iter(frames));

        assert_eq!(stream.read_message().await.unwrap(), Some("hello".to_string()));
        assert_eq!(stream.read_message().await.unwrap(), Some("bytes".to_string()));
        assert_eq!(stream.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_frame_ends_stream() {
        let frames = vec![
            Ok::<_, axum::Error>(Message::Close(None)),
            Ok(Message::Text("never read".to_string())),
        ];
        let mut stream = WsStream::new(stream::iter(frames));

        assert_eq!(stream.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_error_is_reported() {
        let frames = vec![Err::<Message, _>(axum::Error::new("connection reset"))];
        let mut stream = WsStream::new(stream::iter(frames));

        let result = stream.read_message().await;

        assert!(matches!(result, Err(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn test_broadcaster_survives_peer_whose_close_never_finishes() {
        // Arrange: a peer whose write and close handshake both hang.
        let config = HubConfig {
            write_timeout: Some(Duration::from_millis(100)),
            ..HubConfig::default()
        };
        let registry = Arc::new(Registry::new());
        let (_publisher, rx) = broadcast_queue(&config).unwrap();
        let broadcaster = Broadcaster::new(Arc::clone(&registry), rx, &config);

        let hung: Arc<dyn MessageSink> = Arc::new(WsSink::new(wedged()));
        let stuck = Arc::new(ConnectionHandle::new(Identity::new("stuck"), hung));
        registry.join(Arc::clone(&stuck)).unwrap();
        let healthy = Arc::new(RecordingSink::new());
        let alive = Arc::new(ConnectionHandle::new(
            Identity::new("alive"),
            Arc::clone(&healthy) as Arc<dyn MessageSink>,
        ));
        registry.join(Arc::clone(&alive)).unwrap();

        // Act
        let report = tokio::time::timeout(
            Duration::from_secs(3),
            broadcaster.deliver(&OutboundMessage::chat(alive.id(), Identity::new("alive"), "hi")),
        )
        .await
        .expect("delivery must not wait on a wedged close");

        // Assert
        assert_eq!(report.failed, 1);
        assert_eq!(healthy.writes(), vec!["💬 alive: hi".to_string()]);
        assert!(stuck.is_closed());
        assert!(!registry.contains(stuck.id()));
    }
}
