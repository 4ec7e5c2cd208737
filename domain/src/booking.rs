use crate::recipients::Recipients;
use crate::Id;
use events::{BookingStatus, DomainEvent, EventPublisher};
use log::*;
use serde::{Deserialize, Serialize};

/// A passenger's seat reservation on a ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Id,
    pub ride_id: Id,
    pub passenger_id: Id,
    pub status: BookingStatus,
}

impl Booking {
    /// Bookings whose passenger is riding along (or about to) and should see the driver move.
    pub fn is_riding(&self) -> bool {
        matches!(
            self.status,
            BookingStatus::Approved | BookingStatus::Started
        )
    }
}

/// Publishes a booking status change to the booking's passenger and the ride's driver.
///
/// Covers every transition: create (`pending`), approve, reject, cancel and
/// pickup (`started`).
pub async fn notify_status_changed(
    publisher: &EventPublisher,
    booking: &Booking,
    driver_id: Id,
) {
    let mut recipients = Recipients::new();
    recipients.add(booking.passenger_id).add(driver_id);

    if recipients.is_empty() {
        warn!("Booking {} has no one to notify", booking.id);
        return;
    }

    debug!(
        "Booking {} on ride {} now {}",
        booking.id, booking.ride_id, booking.status
    );
    publisher
        .publish(DomainEvent::BookingStatusChanged {
            booking_id: booking.id,
            ride_id: booking.ride_id,
            status: booking.status,
            notify_user_ids: recipients.into_vec(),
        })
        .await;
}
