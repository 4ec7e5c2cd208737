//! Event system infrastructure for the ride sharing backend.
//!
//! This crate provides the event system that decouples domain mutations
//! (rides, bookings, driver documents, driver location pings) from the
//! real-time notification layer that pushes them to connected clients.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all notifiable business events
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, so both the `domain`
//! and `realtime` crates can depend on it without cycles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A type alias for every entity id and user id in the system.
/// Zero is never a valid id; it denotes "no user" (anonymous) at the edges.
pub type Id = u64;

/// Lifecycle status of a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Active,
    Started,
    Completed,
    Cancelled,
}

/// Lifecycle status of a booking on a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Started,
    Rejected,
    Cancelled,
    Completed,
}

/// Moderation status of a driver's submitted documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
    Revision,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Active => "active",
            RideStatus::Started => "started",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Started => "started",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Revision => "revision",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain events that represent committed business-level changes.
///
/// Events include the user ids to notify. The domain layer is responsible
/// for determining the recipients; handlers only route.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A ride was created, started, completed or cancelled.
    RideStatusChanged {
        ride_id: Id,
        status: RideStatus,
        notify_user_ids: Vec<Id>,
    },
    /// A booking was created, approved, rejected, cancelled or picked up,
    /// or changed status as a side effect of its ride changing status.
    BookingStatusChanged {
        booking_id: Id,
        ride_id: Id,
        status: BookingStatus,
        notify_user_ids: Vec<Id>,
    },
    /// A driver reported a new position.
    DriverLocationChanged {
        driver_id: Id,
        lat: f64,
        lng: f64,
        notify_user_ids: Vec<Id>,
    },
    /// A moderator changed the status of a driver's documents.
    DocumentStatusChanged {
        document_id: Id,
        status: DocumentStatus,
        notify_user_ids: Vec<Id>,
    },
}

impl DomainEvent {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::RideStatusChanged { .. } => "ride_status_changed",
            DomainEvent::BookingStatusChanged { .. } => "booking_status_changed",
            DomainEvent::DriverLocationChanged { .. } => "driver_location_changed",
            DomainEvent::DocumentStatusChanged { .. } => "document_status_changed",
        }
    }

    pub fn notify_user_ids(&self) -> &[Id] {
        match self {
            DomainEvent::RideStatusChanged {
                notify_user_ids, ..
            }
            | DomainEvent::BookingStatusChanged {
                notify_user_ids, ..
            }
            | DomainEvent::DriverLocationChanged {
                notify_user_ids, ..
            }
            | DomainEvent::DocumentStatusChanged {
                notify_user_ids, ..
            } => notify_user_ids,
        }
    }
}

/// Trait for handling domain events.
/// Implementations perform side effects like pushing real-time notifications.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers.
    /// Must only be called once the mutation behind the event has committed.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
