use crate::error::Error;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::ws::identity::Identity;
use crate::ws::transport::WebSocketTransport;
use axum::extract::rejection::QueryRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use chrono::Utc;
use futures::{FutureExt, Stream, StreamExt};
use log::*;
use realtime::{ClientMessage, Connection, ConnectionRegistry, ServerMessage};
use serde::Deserialize;
use service::AppState;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WsParams {
    client_id: Option<String>,
    test: Option<String>,
}

impl WsParams {
    fn is_connectivity_check(&self) -> bool {
        self.test.as_deref() == Some("true")
    }
}

#[derive(Debug, Clone, Copy)]
struct SessionSettings {
    idle_timeout: Duration,
    write_timeout: Duration,
}

/// Why a read loop stopped.
#[derive(Debug, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    StreamEnded,
    ReadError,
    IdleTimeout,
    ServerClosed,
}

/// GET /ws upgrades to a WebSocket that receives this user's real-time notifications.
///
/// Query parameters: `client_id` (optional, client-chosen) and `test`
/// (`true` answers with a single `TEST_SUCCESS` frame and closes).
pub(crate) async fn ws_handler(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    params: Result<Query<WsParams>, QueryRejection>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, Error> {
    let Query(params) = params?;
    let upgrade = upgrade?;

    if params.is_connectivity_check() {
        debug!("Connectivity check on /ws");
        return Ok(upgrade.on_upgrade(answer_connectivity_check));
    }

    let identity = Identity::resolve(user.map(|u| u.0), params.client_id.as_deref());
    debug!(
        "Upgrading /ws for client_id={} user_id={:?}",
        identity.client_id, identity.user_id
    );

    let registry = app_state.registry.clone();
    let settings = SessionSettings {
        idle_timeout: app_state.config.ws_idle_timeout(),
        write_timeout: app_state.config.ws_write_timeout(),
    };

    Ok(upgrade.on_upgrade(move |socket| run_session(socket, registry, identity, settings)))
}

async fn answer_connectivity_check(mut socket: WebSocket) {
    match ServerMessage::TestSuccess.to_json() {
        Ok(json) => {
            if let Err(e) = socket.send(Message::Text(json.into())).await {
                debug!("Connectivity check client left before acknowledgement: {e}");
                return;
            }
        }
        Err(e) => error!("Failed to encode connectivity check acknowledgement: {e}"),
    }
    let _ = socket.send(Message::Close(None)).await;
}

/// Runs one connection from registration to unregistration.
///
/// Unregistration happens on every exit path, a panic in the read loop included.
async fn run_session(
    socket: WebSocket,
    registry: ConnectionRegistry,
    identity: Identity,
    settings: SessionSettings,
) {
    let (sink, stream) = socket.split();
    let (transport, closed) = WebSocketTransport::new(sink, settings.write_timeout);
    let connection = Connection::new(identity.client_id, identity.user_id, transport);

    registry.register(&connection).await;
    info!(
        "WebSocket connected: {} client_id={} user_id={}",
        connection.handle(),
        connection.client_id(),
        connection.user_id().unwrap_or(0)
    );

    let welcome = ServerMessage::connection_established(
        connection.client_id().as_str(),
        connection.user_id(),
        Utc::now(),
    );
    if let Err(e) = connection.send(&welcome).await {
        warn!(
            "Failed to acknowledge connection {}: {e}",
            connection.handle()
        );
    }

    let session = read_loop(&connection, stream, closed, settings.idle_timeout);
    finish_session(&registry, &connection, session).await;
}

/// Drives `session` to completion, then unregisters `connection`, even if
/// the session panicked.
async fn finish_session<F>(registry: &ConnectionRegistry, connection: &Connection, session: F)
where
    F: Future<Output = CloseReason>,
{
    match AssertUnwindSafe(session).catch_unwind().await {
        Ok(reason) => debug!(
            "Read loop for {} ended: {reason:?}",
            connection.handle()
        ),
        Err(panic) => error!(
            "Read loop for {} panicked: {}",
            connection.handle(),
            panic_message(panic.as_ref())
        ),
    }

    registry.unregister(connection).await;
    info!(
        "WebSocket disconnected: {} client_id={}",
        connection.handle(),
        connection.client_id()
    );
}

async fn read_loop<S>(
    connection: &Connection,
    mut stream: S,
    mut closed: watch::Receiver<bool>,
    idle_timeout: Duration,
) -> CloseReason
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = closed.wait_for(|closed| *closed) => return CloseReason::ServerClosed,
            next = tokio::time::timeout(idle_timeout, stream.next()) => next,
        };

        match next {
            Err(_) => return CloseReason::IdleTimeout,
            Ok(None) => return CloseReason::StreamEnded,
            Ok(Some(Err(e))) => {
                debug!("Read error on {}: {e}", connection.handle());
                return CloseReason::ReadError;
            }
            Ok(Some(Ok(Message::Close(_)))) => return CloseReason::ClientClosed,
            Ok(Some(Ok(Message::Text(text)))) => handle_text(connection, text.as_str()).await,
            // Binary frames carry nothing we understand; protocol pings are answered by axum.
            Ok(Some(Ok(_))) => {}
        }
    }
}

async fn handle_text(connection: &Connection, text: &str) {
    match ClientMessage::parse(text) {
        Ok(ClientMessage::Ping) => {
            if let Err(e) = connection.send(&ServerMessage::pong_at(Utc::now())).await {
                warn!("Failed to send PONG to {}: {e}", connection.handle());
            }
        }
        Ok(ClientMessage::Other) => {
            trace!("Ignoring client frame on {}", connection.handle());
        }
        Err(e) => {
            debug!(
                "Ignoring malformed frame on {}: {e}",
                connection.handle()
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use realtime::{ClientId, Transport};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::Poll;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_text(&self, text: &str) -> Result<(), realtime::Error> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn registered_connection(
        registry: &ConnectionRegistry,
    ) -> (Arc<Connection>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let connection = Connection::new(ClientId::new("user_5"), Some(5), transport.clone());
        registry.register(&connection).await;
        assert_eq!(registry.connection_count().await, 1);
        (connection, transport)
    }

    #[tokio::test]
    async fn test_panicking_read_loop_still_unregisters() {
        let registry = ConnectionRegistry::new();
        let (connection, transport) = registered_connection(&registry).await;
        let (_closed_tx, closed) = watch::channel(false);
        let exploding = stream::poll_fn(|_| -> Poll<Option<Result<Message, axum::Error>>> {
            panic!("read loop exploded")
        });

        let session = read_loop(&connection, exploding, closed, Duration::from_secs(60));
        finish_session(&registry, &connection, session).await;

        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(registry.user_connection_count(5).await, 0);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ended_stream_unregisters() {
        let registry = ConnectionRegistry::new();
        let (connection, transport) = registered_connection(&registry).await;
        let (_closed_tx, closed) = watch::channel(false);

        let session = read_loop(&connection, stream::empty(), closed, Duration::from_secs(60));
        finish_session(&registry, &connection, session).await;

        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_loop_answers_ping_and_stops_on_close() {
        let registry = ConnectionRegistry::new();
        let (connection, transport) = registered_connection(&registry).await;
        let (_closed_tx, closed) = watch::channel(false);
        let frames = stream::iter(vec![
            Ok(Message::Text(r#"{"type":"PING"}"#.into())),
            Ok(Message::Close(None)),
            Ok(Message::Text(r#"{"type":"PING"}"#.into())),
        ]);

        let reason = read_loop(&connection, frames, closed, Duration::from_secs(60)).await;

        assert_eq!(reason, CloseReason::ClientClosed);
        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("\"PONG\""));
    }

    #[tokio::test]
    async fn test_server_close_stops_read_loop() {
        let registry = ConnectionRegistry::new();
        let (connection, _transport) = registered_connection(&registry).await;
        let (closed_tx, closed) = watch::channel(false);
        closed_tx.send_replace(true);

        let reason = read_loop(&connection, stream::pending(), closed, Duration::from_secs(60)).await;

        assert_eq!(reason, CloseReason::ServerClosed);
    }

    #[test]
    fn test_only_literal_true_requests_a_connectivity_check() {
        let params = |test: Option<&str>| WsParams {
            client_id: None,
            test: test.map(str::to_string),
        };
        assert!(params(Some("true")).is_connectivity_check());
        assert!(!params(Some("1")).is_connectivity_check());
        assert!(!params(Some("false")).is_connectivity_check());
        assert!(!params(None).is_connectivity_check());
    }

    #[test]
    fn test_panic_payloads_are_readable() {
        let static_str: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(static_str.as_ref()), "boom");
        assert_eq!(panic_message(owned.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
