//! Real-time push notifications over WebSockets.
//!
//! This crate owns the in-memory registry of live client connections and the
//! typed messages pushed through them. It knows nothing about HTTP: the web
//! layer upgrades sockets, wraps them in a [`Transport`], and registers them
//! here.
//!
//! # Architecture
//!
//! - **Many connections per user**: a user may be connected from several
//!   devices at once. Every connection of the user receives each message.
//! - **Dual index**: connections are indexed by client id (all of them) and by
//!   user id (authenticated ones only). Both indices sit behind one lock.
//! - **Fire and forget**: broadcasts dispatch one send task per connection and
//!   return immediately. A failed send removes that connection.
//! - **Ephemeral**: users that are offline simply miss the event.
//!
//! # Message Flow
//!
//! 1. A client opens `/ws`; the web layer resolves its identity and registers a
//!    [`Connection`].
//! 2. A domain service changes a ride, booking, driver location or document
//!    and publishes an `events::DomainEvent` naming the users to notify.
//! 3. [`RealtimeDomainEventHandler`] calls the matching [`producer`] function
//!    for each user, which broadcasts to that user's connections.
//!
//! # Modules
//!
//! - `connection`: client ids, connection handles and the `Transport` seam
//! - `registry`: the dual-index `ConnectionRegistry`
//! - `message`: wire frames in both directions
//! - `producer`: typed per-user notifications
//! - `domain_event_handler`: `events::EventHandler` implementation

pub mod connection;
pub mod domain_event_handler;
pub mod error;
pub mod message;
pub mod producer;
pub mod registry;

pub use connection::{ClientId, Connection, ConnectionHandle, Transport, UserId};
pub use domain_event_handler::RealtimeDomainEventHandler;
pub use error::{Error, ErrorKind};
pub use message::{ClientMessage, EventType, ServerMessage};
pub use registry::ConnectionRegistry;
