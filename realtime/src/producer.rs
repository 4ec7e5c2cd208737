//! Typed entry points the domain layer uses to notify a single user.
//!
//! Each function builds the matching [`ServerMessage`] and hands it to
//! [`ConnectionRegistry::broadcast_to_user`]. None of them wait for delivery,
//! and a user without live connections is not an error.

use crate::connection::UserId;
use crate::message::ServerMessage;
use crate::registry::ConnectionRegistry;
use events::{BookingStatus, DocumentStatus, Id, RideStatus};

pub async fn send_ride_status_update(
    registry: &ConnectionRegistry,
    user_id: UserId,
    ride_id: Id,
    status: RideStatus,
) -> usize {
    registry
        .broadcast_to_user(user_id, &ServerMessage::RideStatusUpdate { ride_id, status })
        .await
}

pub async fn send_booking_status_update(
    registry: &ConnectionRegistry,
    user_id: UserId,
    booking_id: Id,
    status: BookingStatus,
) -> usize {
    registry
        .broadcast_to_user(
            user_id,
            &ServerMessage::BookingStatusUpdate { booking_id, status },
        )
        .await
}

pub async fn send_driver_location_update(
    registry: &ConnectionRegistry,
    user_id: UserId,
    driver_id: Id,
    lat: f64,
    lng: f64,
) -> usize {
    registry
        .broadcast_to_user(
            user_id,
            &ServerMessage::DriverLocationUpdate {
                driver_id,
                lat,
                lng,
            },
        )
        .await
}

pub async fn send_document_status_update(
    registry: &ConnectionRegistry,
    user_id: UserId,
    document_id: Id,
    status: DocumentStatus,
) -> usize {
    registry
        .broadcast_to_user(
            user_id,
            &ServerMessage::DocumentStatusUpdate {
                document_id,
                status,
            },
        )
        .await
}
