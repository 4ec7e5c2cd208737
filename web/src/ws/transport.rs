use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use log::*;
use realtime::{Error, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Write half of an upgraded socket.
///
/// Broadcast tasks and the read loop's pong replies share the sink, so writes
/// are serialized behind a mutex and each one is bounded by `write_timeout`.
/// Closing flips a watch flag the read loop listens on, so a connection
/// dropped by a failed broadcast stops reading too.
pub(crate) struct WebSocketTransport {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    write_timeout: Duration,
    closed: watch::Sender<bool>,
}

impl WebSocketTransport {
    pub(crate) fn new(
        sink: SplitSink<WebSocket, Message>,
        write_timeout: Duration,
    ) -> (Arc<Self>, watch::Receiver<bool>) {
        let (closed, closed_rx) = watch::channel(false);
        let transport = Arc::new(Self {
            sink: Mutex::new(sink),
            write_timeout,
            closed,
        });
        (transport, closed_rx)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&self, text: &str) -> Result<(), Error> {
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(self.write_timeout, sink.send(Message::Text(text.into()))).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::transport(e)),
            Err(_) => Err(Error::timeout()),
        }
    }

    async fn close(&self) {
        self.closed.send_replace(true);

        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(self.write_timeout, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => trace!("Socket already gone while closing: {e}"),
            Err(_) => debug!("Timed out sending close frame"),
        }
    }
}
