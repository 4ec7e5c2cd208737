use crate::producer;
use crate::registry::ConnectionRegistry;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;

/// Turns domain events into WebSocket notifications.
///
/// The domain layer decides who hears about a change and puts those user ids
/// in the event. This handler only routes: one typed send per recipient.
pub struct RealtimeDomainEventHandler {
    registry: ConnectionRegistry,
}

impl RealtimeDomainEventHandler {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventHandler for RealtimeDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        let mut dispatched = 0;

        match event {
            DomainEvent::RideStatusChanged {
                ride_id,
                status,
                notify_user_ids,
            } => {
                debug!("Handling RideStatusChanged for ride {ride_id} ({status})");
                for user_id in notify_user_ids {
                    dispatched += producer::send_ride_status_update(
                        &self.registry,
                        *user_id,
                        *ride_id,
                        *status,
                    )
                    .await;
                }
            }

            DomainEvent::BookingStatusChanged {
                booking_id,
                status,
                notify_user_ids,
                ..
            } => {
                debug!("Handling BookingStatusChanged for booking {booking_id} ({status})");
                for user_id in notify_user_ids {
                    dispatched += producer::send_booking_status_update(
                        &self.registry,
                        *user_id,
                        *booking_id,
                        *status,
                    )
                    .await;
                }
            }

            DomainEvent::DriverLocationChanged {
                driver_id,
                lat,
                lng,
                notify_user_ids,
            } => {
                trace!("Handling DriverLocationChanged for driver {driver_id}");
                for user_id in notify_user_ids {
                    dispatched += producer::send_driver_location_update(
                        &self.registry,
                        *user_id,
                        *driver_id,
                        *lat,
                        *lng,
                    )
                    .await;
                }
            }

            DomainEvent::DocumentStatusChanged {
                document_id,
                status,
                notify_user_ids,
            } => {
                debug!("Handling DocumentStatusChanged for document {document_id} ({status})");
                for user_id in notify_user_ids {
                    dispatched += producer::send_document_status_update(
                        &self.registry,
                        *user_id,
                        *document_id,
                        *status,
                    )
                    .await;
                }
            }
        }

        debug!(
            "{} fanned out to {} connection(s) across {} user(s): {:?}",
            event.name(),
            dispatched,
            event.notify_user_ids().len(),
            event.notify_user_ids()
        );
    }
}
