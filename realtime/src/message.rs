use crate::error::Error;
use chrono::{DateTime, Utc};
use events::{BookingStatus, DocumentStatus, Id, RideStatus};
use serde::{Deserialize, Serialize};

/// Trait for getting the wire name of a message type
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Every frame the server pushes to a client, serialized as
/// `{"type": <TYPE>, "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    // Domain notifications
    RideStatusUpdate {
        ride_id: Id,
        status: RideStatus,
    },
    BookingStatusUpdate {
        booking_id: Id,
        status: BookingStatus,
    },
    DriverLocationUpdate {
        driver_id: Id,
        lat: f64,
        lng: f64,
    },
    DocumentStatusUpdate {
        document_id: Id,
        status: DocumentStatus,
    },

    // Connection lifecycle
    /// Sent once right after registration. `user_id` is 0 for anonymous connections.
    ConnectionEstablished {
        client_id: String,
        user_id: Id,
        timestamp: i64,
    },
    /// Reply to a client `PING`; timestamp in unix seconds.
    Pong {
        timestamp: i64,
    },
    /// The only frame sent on a `test=true` connection before closing.
    TestSuccess,
}

impl EventType for ServerMessage {
    fn event_type(&self) -> &'static str {
        match self {
            ServerMessage::RideStatusUpdate { .. } => "RIDE_STATUS_UPDATE",
            ServerMessage::BookingStatusUpdate { .. } => "BOOKING_STATUS_UPDATE",
            ServerMessage::DriverLocationUpdate { .. } => "DRIVER_LOCATION_UPDATE",
            ServerMessage::DocumentStatusUpdate { .. } => "DOCUMENT_STATUS_UPDATE",
            ServerMessage::ConnectionEstablished { .. } => "CONNECTION_ESTABLISHED",
            ServerMessage::Pong { .. } => "PONG",
            ServerMessage::TestSuccess => "TEST_SUCCESS",
        }
    }
}

impl ServerMessage {
    pub fn connection_established(
        client_id: impl Into<String>,
        user_id: Option<Id>,
        at: DateTime<Utc>,
    ) -> Self {
        ServerMessage::ConnectionEstablished {
            client_id: client_id.into(),
            user_id: user_id.unwrap_or(0),
            timestamp: at.timestamp(),
        }
    }

    pub fn pong_at(at: DateTime<Utc>) -> Self {
        ServerMessage::Pong {
            timestamp: at.timestamp(),
        }
    }

    /// Each call produces a fresh buffer; nothing is shared between sends.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What the read loop understands from a client frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    Ping,
    /// Valid JSON that is not a keep-alive. Accepted and discarded.
    Other,
}

#[derive(Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type", default)]
    message_type: Option<String>,
}

impl ClientMessage {
    /// Parses one inbound text frame. `{"type":"PING"}` and `{"type":"ping"}`
    /// are keep-alives; any other JSON object is `Other`. Non-JSON input is an error.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let envelope: InboundEnvelope = serde_json::from_str(text)?;
        match envelope.message_type.as_deref() {
            Some(kind) if kind.eq_ignore_ascii_case("ping") => Ok(ClientMessage::Ping),
            _ => Ok(ClientMessage::Other),
        }
    }
}
