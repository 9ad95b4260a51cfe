//! Registry: the authoritative set of open connections.
//!
//! Presence in the registry is the *only* thing that makes a connection
//! eligible to receive broadcasts.  The acceptor adds a connection on join,
//! and either the read loop (peer hung up) or the broadcaster (write failed)
//! removes it on leave.
//!
//! # Locking
//!
//! One `std::sync::Mutex` guards the map.  Every critical section is a map
//! insert, remove or copy; the lock is never held across an `.await`, so a
//! slow peer can never hold up a join on another connection.  A plain
//! (non-async) mutex is the right tool for such short sections.
//!
//! Each critical section leaves the map consistent even if it panics part
//! way, so a poisoned lock is recovered rather than propagated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::connection::ConnectionHandle;
use crate::domain::identity::ConnectionId;

/// Errors returned by [`Registry::join`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A connection with this handle id is already registered.
    #[error("connection {0} is already registered")]
    DuplicateHandle(ConnectionId),
}

/// Mapping from connection handle to the shared [`ConnectionHandle`].
#[derive(Default)]
pub struct Registry {
    connections: Mutex<HashMap<ConnectionId, Arc<ConnectionHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Arc<ConnectionHandle>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `connection` under its handle id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateHandle`] if the id is already
    /// present; the existing entry is left untouched.
    pub fn join(&self, connection: Arc<ConnectionHandle>) -> Result<(), RegistryError> {
        let id = connection.id();
        let mut map = self.lock();
        if map.contains_key(&id) {
            return Err(RegistryError::DuplicateHandle(id));
        }
        map.insert(id, connection);
        debug!(connection = %id, members = map.len(), "registry join");
        Ok(())
    }

    /// Removes the connection with handle `id`.
    ///
    /// Returns the removed handle, or `None` if it was not registered (for
    /// example because the other cleanup path got there first).
    pub fn leave(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let mut map = self.lock();
        let removed = map.remove(&id);
        if removed.is_some() {
            debug!(connection = %id, members = map.len(), "registry leave");
        }
        removed
    }

    /// Copies the current membership.  Order is unspecified.
    pub fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        self.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Display labels of every member, sorted.  Used for diagnostics.
    pub fn identities(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .lock()
            .values()
            .map(|c| c.identity().display_label().to_string())
            .collect();
        labels.sort();
        labels
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
