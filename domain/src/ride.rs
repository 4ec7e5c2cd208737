use crate::booking::Booking;
use crate::recipients::Recipients;
use crate::Id;
use events::{BookingStatus, DomainEvent, EventPublisher, RideStatus};
use log::*;
use serde::{Deserialize, Serialize};

/// The parts of a ride that decide who hears about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: Id,
    pub driver_id: Id,
    /// Set when a passenger requested the ride directly rather than booking a seat.
    pub passenger_id: Option<Id>,
    pub status: RideStatus,
}

impl Ride {
    /// Driver first, then the direct passenger if there is one.
    pub fn participants(&self) -> Recipients {
        let mut recipients = Recipients::new();
        recipients.add(self.driver_id).add_opt(self.passenger_id);
        recipients
    }

    /// Whether passengers should be following the driver's position.
    pub fn is_in_progress(&self) -> bool {
        matches!(self.status, RideStatus::Active | RideStatus::Started)
    }
}

/// Status every booking of a ride moves to when the ride itself moves to `status`.
/// Creating a ride (`active`) does not touch bookings.
pub fn cascaded_booking_status(status: RideStatus) -> Option<BookingStatus> {
    match status {
        RideStatus::Active => None,
        RideStatus::Started => Some(BookingStatus::Started),
        RideStatus::Completed => Some(BookingStatus::Completed),
        RideStatus::Cancelled => Some(BookingStatus::Cancelled),
    }
}

/// Publishes the notifications for a ride whose status change has been stored.
///
/// The driver and the direct passenger receive the new ride status. When the
/// ride was started, completed or cancelled, the passenger of each booking also
/// receives that booking's cascaded status. Returns the number of events published.
pub async fn notify_status_changed(
    publisher: &EventPublisher,
    ride: &Ride,
    bookings: &[Booking],
) -> usize {
    let mut published = 0;

    publisher
        .publish(DomainEvent::RideStatusChanged {
            ride_id: ride.id,
            status: ride.status,
            notify_user_ids: ride.participants().into_vec(),
        })
        .await;
    published += 1;

    if let Some(booking_status) = cascaded_booking_status(ride.status) {
        for booking in bookings.iter().filter(|b| b.ride_id == ride.id) {
            let recipients: Recipients = [booking.passenger_id].into_iter().collect();
            if recipients.is_empty() {
                continue;
            }
            publisher
                .publish(DomainEvent::BookingStatusChanged {
                    booking_id: booking.id,
                    ride_id: ride.id,
                    status: booking_status,
                    notify_user_ids: recipients.into_vec(),
                })
                .await;
            published += 1;
        }
    }

    debug!(
        "Published {published} event(s) for ride {} now {}",
        ride.id, ride.status
    );
    published
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingHandler;

    fn ride(status: RideStatus) -> Ride {
        Ride {
            id: 10,
            driver_id: 1,
            passenger_id: Some(2),
            status,
        }
    }

    fn booking(id: Id, passenger_id: Id, status: BookingStatus) -> Booking {
        Booking {
            id,
            ride_id: 10,
            passenger_id,
            status,
        }
    }

    #[tokio::test]
    async fn test_cancelled_ride_notifies_participants_and_every_booking() {
        let (publisher, handler) = RecordingHandler::publisher();
        let bookings = vec![
            booking(100, 3, BookingStatus::Approved),
            booking(101, 4, BookingStatus::Pending),
        ];

        let published =
            notify_status_changed(&publisher, &ride(RideStatus::Cancelled), &bookings).await;

        assert_eq!(published, 3);
        assert_eq!(
            handler.events().await,
            vec![
                DomainEvent::RideStatusChanged {
                    ride_id: 10,
                    status: RideStatus::Cancelled,
                    notify_user_ids: vec![1, 2],
                },
                DomainEvent::BookingStatusChanged {
                    booking_id: 100,
                    ride_id: 10,
                    status: BookingStatus::Cancelled,
                    notify_user_ids: vec![3],
                },
                DomainEvent::BookingStatusChanged {
                    booking_id: 101,
                    ride_id: 10,
                    status: BookingStatus::Cancelled,
                    notify_user_ids: vec![4],
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_started_and_completed_cascade_matching_booking_status() {
        for (ride_status, booking_status) in [
            (RideStatus::Started, BookingStatus::Started),
            (RideStatus::Completed, BookingStatus::Completed),
        ] {
            let (publisher, handler) = RecordingHandler::publisher();
            notify_status_changed(
                &publisher,
                &ride(ride_status),
                &[booking(100, 3, BookingStatus::Approved)],
            )
            .await;

            let events = handler.events().await;
            assert_eq!(
                events[1],
                DomainEvent::BookingStatusChanged {
                    booking_id: 100,
                    ride_id: 10,
                    status: booking_status,
                    notify_user_ids: vec![3],
                }
            );
        }
    }

    #[tokio::test]
    async fn test_created_ride_does_not_touch_bookings() {
        let (publisher, handler) = RecordingHandler::publisher();

        let published = notify_status_changed(
            &publisher,
            &ride(RideStatus::Active),
            &[booking(100, 3, BookingStatus::Pending)],
        )
        .await;

        assert_eq!(published, 1);
        assert_eq!(handler.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ride_without_passenger_notifies_driver_only() {
        let (publisher, handler) = RecordingHandler::publisher();
        let ride = Ride {
            passenger_id: None,
            ..ride(RideStatus::Started)
        };

        notify_status_changed(&publisher, &ride, &[]).await;

        assert_eq!(handler.events().await[0].notify_user_ids(), &[1]);
    }

    #[tokio::test]
    async fn test_driver_riding_as_own_passenger_is_notified_once() {
        let (publisher, handler) = RecordingHandler::publisher();
        let ride = Ride {
            passenger_id: Some(1),
            ..ride(RideStatus::Started)
        };

        notify_status_changed(&publisher, &ride, &[]).await;

        assert_eq!(handler.events().await[0].notify_user_ids(), &[1]);
    }

    #[tokio::test]
    async fn test_bookings_of_other_rides_are_ignored() {
        let (publisher, handler) = RecordingHandler::publisher();
        let foreign = Booking {
            ride_id: 99,
            ..booking(100, 3, BookingStatus::Approved)
        };

        notify_status_changed(&publisher, &ride(RideStatus::Completed), &[foreign]).await;

        assert_eq!(handler.events().await.len(), 1);
    }
}
