use crate::error::Error;
use crate::message::ServerMessage;
use async_trait::async_trait;
use chrono::Utc;
use log::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Stable identity of an authenticated user. Anonymous connections carry none.
pub type UserId = events::Id;

const USER_CLIENT_ID_PREFIX: &str = "user_";
const ANONYMOUS_CLIENT_ID_PREFIX: &str = "anon_";

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static NEXT_ANONYMOUS_SEQ: AtomicU64 = AtomicU64::new(0);

/// Externally visible connection id, either chosen by the client through the
/// `client_id` query parameter or generated by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id given to an authenticated user that did not pick one: `user_<id>`.
    pub fn for_user(user_id: UserId) -> Self {
        Self(format!("{USER_CLIENT_ID_PREFIX}{user_id}"))
    }

    /// A synthetic id for an anonymous connection, derived from its creation time.
    /// The sequence suffix keeps two ids minted in the same nanosecond apart.
    pub fn anonymous() -> Self {
        let created_at = Utc::now();
        let nanos = created_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| created_at.timestamp_micros() * 1_000);
        let seq = NEXT_ANONYMOUS_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{ANONYMOUS_CLIENT_ID_PREFIX}{nanos}_{seq}"))
    }

    /// Extracts a user id embedded in a client-chosen id of the form `user_<n>`.
    ///
    /// Leading digits after the prefix are read and anything after them is
    /// ignored, so `user_12` and `user_12-tablet` both resolve to 12. Zero and
    /// ids without digits resolve to `None`.
    pub fn embedded_user_id(&self) -> Option<UserId> {
        let rest = self.0.strip_prefix(USER_CLIENT_ID_PREFIX)?;
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        rest[..digits_end]
            .parse::<UserId>()
            .ok()
            .filter(|id| *id > 0)
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with(ANONYMOUS_CLIENT_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-unique identity of one `Connection` object. Two sockets that share a
/// `ClientId` still get distinct handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The write half of a bidirectional message channel to one client.
///
/// The web layer implements this for an upgraded WebSocket; tests implement it
/// with in-memory recorders.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Writes one text frame.
    async fn send_text(&self, text: &str) -> Result<(), Error>;

    /// Closes the channel. Called at most once per `Connection`.
    async fn close(&self);
}

/// One live client session: identity plus the transport used to reach it.
pub struct Connection {
    handle: ConnectionHandle,
    client_id: ClientId,
    user_id: Option<UserId>,
    transport: Arc<dyn Transport>,
    closed: AtomicBool,
}

impl Connection {
    /// A `user_id` of `Some(0)` is treated as anonymous.
    pub fn new(
        client_id: ClientId,
        user_id: Option<UserId>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            handle: ConnectionHandle::next(),
            client_id,
            user_id: user_id.filter(|id| *id > 0),
            transport,
            closed: AtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Writes an already serialized frame. Refused once the connection is closed.
    pub async fn send_text(&self, text: &str) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::closed());
        }
        self.transport.send_text(text).await
    }

    pub async fn send(&self, message: &ServerMessage) -> Result<(), Error> {
        let json = message.to_json()?;
        self.send_text(&json).await
    }

    /// Closes the underlying transport the first time it is called; later calls do nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        trace!("Closing connection {} ({})", self.handle, self.client_id);
        self.transport.close().await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Connection")
            .field("handle", &self.handle)
            .field("client_id", &self.client_id)
            .field("user_id", &self.user_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
