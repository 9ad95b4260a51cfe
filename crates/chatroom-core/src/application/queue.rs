//! The broadcast queue: many producers, one consumer.
//!
//! Every read loop and every join/leave transition pushes through a cloned
//! [`Publisher`]; the broadcaster owns the only receiver.  The channel is a
//! bounded `tokio::sync::mpsc`, so it needs no extra locking and preserves
//! the order in which sends complete.
//!
//! # Backpressure policy
//!
//! A full queue blocks the producer for at most `enqueue_timeout`.  If there
//! is still no room the message is handed back as
//! [`PublishError::QueueFull`]; nothing is ever dropped without the caller
//! being told.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::SendTimeoutError};

use crate::domain::config::{ConfigError, HubConfig};
use crate::domain::message::OutboundMessage;

/// Errors returned by [`Publisher::publish`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// The queue stayed full for the whole enqueue timeout.
    #[error("broadcast queue full after waiting {0:?}")]
    QueueFull(Duration),

    /// The broadcaster has stopped; nothing will ever be delivered again.
    #[error("broadcast queue closed")]
    Closed,
}

/// Producer side of the broadcast queue.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::Sender<OutboundMessage>,
    enqueue_timeout: Duration,
}

impl Publisher {
    /// Enqueues `message` for delivery.
    ///
    /// # Errors
    ///
    /// - [`PublishError::QueueFull`] if no slot freed up within the timeout.
    /// - [`PublishError::Closed`] if the broadcaster is gone.
    pub async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError> {
        self.tx
            .send_timeout(message, self.enqueue_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => PublishError::QueueFull(self.enqueue_timeout),
                SendTimeoutError::Closed(_) => PublishError::Closed,
            })
    }

    /// Number of free slots right now.  Diagnostic only.
    pub fn free_slots(&self) -> usize {
        self.tx.capacity()
    }
}

/// Creates the bounded broadcast queue described by `config`.
///
/// # Errors
///
/// Returns [`ConfigError`] if `config` fails validation (for example a zero or
/// oversized capacity, which `tokio::sync::mpsc::channel` would panic on).
pub fn broadcast_queue(
    config: &HubConfig,
) -> Result<(Publisher, mpsc::Receiver<OutboundMessage>), ConfigError> {
    config.validate()?;
    let (tx, rx) = mpsc::channel(config.queue_capacity);
    Ok((
        Publisher {
            tx,
            enqueue_timeout: config.enqueue_timeout,
        },
        rx,
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Identity;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn chat(text: &str) -> OutboundMessage {
        OutboundMessage::chat(Uuid::new_v4(), Identity::new("alice"), text)
    }

    #[tokio::test]
    async fn test_publish_is_fifo() {
        // Arrange
        let (publisher, mut rx) = broadcast_queue(&HubConfig::default()).unwrap();

        // Act
        assert_ok!(publisher.publish(chat("one")).await);
        assert_ok!(publisher.publish(chat("two")).await);

        // Assert
        assert_eq!(rx.recv().await.unwrap().text(), "one");
        assert_eq!(rx.recv().await.unwrap().text(), "two");
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_times_out_with_queue_full() {
        // Arrange: room for exactly one message, nobody consuming.
        let config = HubConfig {
            queue_capacity: 1,
            enqueue_timeout: Duration::from_millis(100),
            ..HubConfig::default()
        };
        let (publisher, _rx) = broadcast_queue(&config).unwrap();
        assert_ok!(publisher.publish(chat("fits")).await);

        // Act
        let result = publisher.publish(chat("overflow")).await;

        // Assert
        assert_eq!(result, Err(PublishError::QueueFull(Duration::from_millis(100))));
    }

    #[tokio::test]
    async fn test_full_queue_unblocks_when_consumer_drains() {
        let config = HubConfig {
            queue_capacity: 1,
            ..HubConfig::default()
        };
        let (publisher, mut rx) = broadcast_queue(&config).unwrap();
        assert_ok!(publisher.publish(chat("first")).await);

        let waiting = {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.publish(chat("second")).await })
        };
        assert_eq!(rx.recv().await.unwrap().text(), "first");

        assert_ok!(waiting.await.unwrap());
        assert_eq!(rx.recv().await.unwrap().text(), "second");
    }

    #[tokio::test]
    async fn test_publish_after_consumer_dropped_is_closed() {
        let (publisher, rx) = broadcast_queue(&HubConfig::default()).unwrap();
        drop(rx);
        let result = publisher.publish(chat("lost")).await;
        assert_err!(&result);
        assert_eq!(result, Err(PublishError::Closed));
    }

    #[test]
    fn test_zero_capacity_is_a_config_error() {
        let config = HubConfig {
            queue_capacity: 0,
            ..HubConfig::default()
        };
        assert_eq!(
            broadcast_queue(&config).err(),
            Some(ConfigError::ZeroQueueCapacity)
        );
    }

    #[test]
    fn test_oversized_capacity_is_a_config_error() {
        let config = HubConfig {
            queue_capacity: usize::MAX,
            ..HubConfig::default()
        };
        assert!(matches!(
            broadcast_queue(&config).err(),
            Some(ConfigError::QueueCapacityTooLarge { .. })
        ));
    }
}
