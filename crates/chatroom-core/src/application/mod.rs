//! Application layer: the registry, the broadcast queue, the broadcaster and
//! the connection lifecycle.
//!
//! Everything here depends only on the domain types and on the transport
//! traits in [`crate::connection`], so it runs unchanged against a real
//! WebSocket or against the recording doubles used in tests.
//!
//! # Ownership at a glance
//!
//! ```text
//! Hub ──owns──► Arc<Registry> ◄──shares── Broadcaster
//!  │                                          ▲
//!  └──owns──► Publisher ──(bounded mpsc)──────┘
//! ```

pub mod broadcaster;
pub mod hub;
pub mod queue;
pub mod registry;

pub use broadcaster::{Broadcaster, DeliveryReport};
pub use hub::{hub_with_queue, Hub, HubError};
pub use queue::{broadcast_queue, PublishError, Publisher};
pub use registry::{Registry, RegistryError};
