//! WebSocket endpoint for real-time notifications.
//!
//! Only the HTTP-facing half lives here: upgrading the request, resolving who
//! the connection belongs to, and adapting the socket to `realtime::Transport`.
//! The registry and message types live in the `realtime` crate.

pub(crate) mod handler;
pub(crate) mod identity;
pub(crate) mod transport;
