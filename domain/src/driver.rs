use crate::booking::Booking;
use crate::error::Error;
use crate::recipients::Recipients;
use crate::ride::Ride;
use crate::Id;
use events::{DomainEvent, EventPublisher};
use log::*;
use serde::{Deserialize, Serialize};

/// A driver's reported position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Result<Self, Error> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::invalid(format!("latitude {lat} out of range")));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(Error::invalid(format!("longitude {lng} out of range")));
        }
        Ok(Self { lat, lng })
    }
}

/// One of the driver's rides together with its bookings.
#[derive(Debug, Clone, PartialEq)]
pub struct RideRoster {
    pub ride: Ride,
    pub bookings: Vec<Booking>,
}

/// Everyone who should see this driver move: the direct passenger of each
/// `active` or `started` ride of theirs, plus the passengers of that ride's
/// `approved` or `started` bookings.
pub fn location_recipients(driver_id: Id, rides: &[RideRoster]) -> Recipients {
    let mut recipients = Recipients::new();
    for roster in rides
        .iter()
        .filter(|r| r.ride.driver_id == driver_id && r.ride.is_in_progress())
    {
        recipients.add_opt(roster.ride.passenger_id);
        for booking in roster.bookings.iter().filter(|b| b.is_riding()) {
            recipients.add(booking.passenger_id);
        }
    }
    recipients
}

/// Publishes a driver's new position to the passengers following them.
///
/// Returns how many users were notified; no event is published when nobody is
/// following the driver.
pub async fn notify_location_changed(
    publisher: &EventPublisher,
    driver_id: Id,
    location: Location,
    rides: &[RideRoster],
) -> usize {
    let recipients = location_recipients(driver_id, rides).into_vec();
    if recipients.is_empty() {
        trace!("Driver {driver_id} moved with no passengers following");
        return 0;
    }

    let notified = recipients.len();
    publisher
        .publish(DomainEvent::DriverLocationChanged {
            driver_id,
            lat: location.lat,
            lng: location.lng,
            notify_user_ids: recipients,
        })
        .await;
    notified
}
