//! Hub: connection lifecycle glue.
//!
//! The hub ties the [`Registry`] and the broadcast queue together and owns
//! the per-connection state machine:
//!
//! ```text
//! Connecting ──join──► Active ──read failure / write failure──► Closed
//! ```
//!
//! - `Connecting → Active`: [`Hub::join`] registers the connection and, when
//!   presence announcements are on, enqueues "joined".  This happens before
//!   the read loop starts, so the announcement always precedes the
//!   connection's own chat lines.
//! - `Active`: [`Hub::run_read_loop`] turns every inbound line into one chat
//!   message.
//! - `Active → Closed`: the read loop ends (peer hung up, read error, or the
//!   broadcaster closed the handle) and calls [`Hub::leave`], then enqueues
//!   "left".  The broadcaster's cleanup path removes and closes without
//!   announcing; the close wakes the read loop, which announces on its
//!   behalf.  [`ConnectionHandle::mark_departed`] makes the announcement go
//!   out once per connection whichever path got there first.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::broadcaster::Broadcaster;
use crate::application::queue::{broadcast_queue, PublishError, Publisher};
use crate::application::registry::{Registry, RegistryError};
use crate::connection::{ConnectionHandle, MessageSink, MessageStream};
use crate::domain::config::{ConfigError, HubConfig};
use crate::domain::identity::Identity;
use crate::domain::message::OutboundMessage;

/// Errors from lifecycle operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HubError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Shared entry point for acceptors.
///
/// Wrap in an `Arc` and hand a clone to every connection task.
pub struct Hub {
    registry: Arc<Registry>,
    publisher: Publisher,
    announce_presence: bool,
    close_timeout: Option<Duration>,
}

impl Hub {
    /// Builds a hub and the broadcaster that serves it.
    ///
    /// The broadcaster is returned unstarted so tests can drive
    /// [`Broadcaster::deliver`] by hand; production code usually calls
    /// [`Hub::start`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` is invalid.
    pub fn new(config: &HubConfig) -> Result<(Self, Broadcaster), ConfigError> {
        let (publisher, rx) = broadcast_queue(config)?;
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), rx, config);
        let hub = Self::from_parts(registry, publisher, config);
        Ok((hub, broadcaster))
    }

    /// Builds a hub around an existing registry and queue.
    ///
    /// Only the lifecycle settings of `config` are used: presence
    /// announcements, and `write_timeout` as the bound on close handshakes.
    pub fn from_parts(registry: Arc<Registry>, publisher: Publisher, config: &HubConfig) -> Self {
        Self {
            registry,
            publisher,
            announce_presence: config.announce_presence,
            close_timeout: config.write_timeout,
        }
    }

    /// Builds a hub and spawns its broadcaster on the current runtime.
    ///
    /// The broadcaster task ends once the returned hub (and every clone of
    /// its publisher) has been dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` is invalid.
    pub fn start(config: &HubConfig) -> Result<(Arc<Self>, JoinHandle<()>), ConfigError> {
        let (hub, broadcaster) = Self::new(config)?;
        let task = tokio::spawn(broadcaster.run());
        Ok((Arc::new(hub), task))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// A producer handle for code outside the lifecycle (system notices,
    /// admin tools).
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// The single inbound "publish" operation.
    ///
    /// # Errors
    ///
    /// See [`Publisher::publish`].
    pub async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError> {
        self.publisher.publish(message).await
    }

    /// `Connecting → Active`: registers `connection` and announces it.
    ///
    /// A failure to enqueue the announcement is logged but does not undo the
    /// join; the connection is live either way.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Registry`] if the handle id is already registered.
    pub async fn join(&self, connection: Arc<ConnectionHandle>) -> Result<(), HubError> {
        let id = connection.id();
        let identity = connection.identity().clone();
        self.registry.join(connection)?;
        info!(
            connection = %id,
            identity = %identity,
            members = self.registry.len(),
            "connection joined"
        );

        if self.announce_presence {
            if let Err(e) = self.publish(OutboundMessage::joined(id, identity)).await {
                warn!(connection = %id, error = %e, "could not announce join");
            }
        }
        Ok(())
    }

    /// Removes `connection` from the registry and closes it.
    ///
    /// Safe to call any number of times and from any path.  Returns `true` if
    /// this call removed the registry entry.
    pub async fn leave(&self, connection: &ConnectionHandle) -> bool {
        let removed = self.registry.leave(connection.id()).is_some();
        connection.close_within(self.close_timeout).await;
        if removed {
            info!(
                connection = %connection.id(),
                identity = %connection.identity(),
                members = self.registry.len(),
                "connection left"
            );
        }
        removed
    }

    /// Reads from `stream` until it fails or ends, publishing one chat
    /// message per line, then performs the `Active → Closed` transition.
    pub async fn run_read_loop<S>(&self, connection: Arc<ConnectionHandle>, mut stream: S)
    where
        S: MessageStream,
    {
        let id = connection.id();
        loop {
            let read = tokio::select! {
                read = stream.read_message() => read,
                _ = connection.closed() => {
                    debug!(connection = %id, "closed by broadcaster; stopping reads");
                    break;
                }
            };

            match read {
                Ok(Some(line)) => {
                    let message = OutboundMessage::chat(id, connection.identity().clone(), line);
                    match self.publish(message).await {
                        Ok(()) => {}
                        Err(e @ PublishError::QueueFull(_)) => {
                            warn!(connection = %id, error = %e, "chat message dropped");
                        }
                        Err(PublishError::Closed) => {
                            warn!(connection = %id, "broadcaster gone; closing connection");
                            break;
                        }
                    }
                }
                Ok(None) => {
                    debug!(connection = %id, "peer closed the stream");
                    break;
                }
                Err(e) => {
                    debug!(connection = %id, error = %e, "read failed");
                    break;
                }
            }
        }

        self.leave(&connection).await;

        // The entry may already be gone if the broadcaster dropped the peer;
        // the departure latch still lets exactly one "left" through.
        if connection.mark_departed() && self.announce_presence {
            let left = OutboundMessage::left(id, connection.identity().clone());
            if let Err(e) = self.publish(left).await {
                debug!(connection = %id, error = %e, "could not announce leave");
            }
        }
    }

    /// Entry point for acceptors: wraps the transport halves, joins, and
    /// spawns the read loop.
    ///
    /// # Errors
    ///
    /// Returns [`HubError`] if the connection could not be registered; the
    /// sink is closed in that case.
    pub async fn on_connection_established<S>(
        self: &Arc<Self>,
        sink: Arc<dyn MessageSink>,
        stream: S,
        identity: Identity,
    ) -> Result<Arc<ConnectionHandle>, HubError>
    where
        S: MessageStream + 'static,
    {
        let connection = Arc::new(ConnectionHandle::new(identity, sink));
        if let Err(e) = self.join(Arc::clone(&connection)).await {
            connection.close_within(self.close_timeout).await;
            return Err(e);
        }

        let hub = Arc::clone(self);
        let reader = Arc::clone(&connection);
        tokio::spawn(async move {
            hub.run_read_loop(reader, stream).await;
        });
        Ok(connection)
    }
}

/// Creates a hub whose queue receiver is handed to the caller instead of a
/// broadcaster.  Lets tests inspect exactly what was enqueued.
pub fn hub_with_queue(
    config: &HubConfig,
) -> Result<(Hub, mpsc::Receiver<OutboundMessage>), ConfigError> {
    let (publisher, rx) = broadcast_queue(config)?;
    let hub = Hub::from_parts(Arc::new(Registry::new()), publisher, config);
    Ok((hub, rx))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
