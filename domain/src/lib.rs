//! Ride-sharing domain rules for real-time notifications.
//!
//! Domain services call into this crate after a ride, booking, driver location
//! or document change has been stored. Each module decides which users must
//! hear about the change and publishes an `events::DomainEvent` naming them;
//! delivery is left to whatever handlers the publisher carries.

pub use events::{BookingStatus, DocumentStatus, EventPublisher, Id, RideStatus};

pub mod booking;
pub mod document;
pub mod driver;
pub mod error;
pub mod jwt;
pub mod recipients;
pub mod ride;
