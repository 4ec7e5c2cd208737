use config::Config;
use events::EventPublisher;
use realtime::{ConnectionRegistry, RealtimeDomainEventHandler};
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: ConnectionRegistry,
    pub event_publisher: Arc<EventPublisher>,
}

impl AppState {
    /// Wires a fresh registry to a publisher whose realtime handler pushes
    /// every domain event to the affected users' connections.
    pub fn new(app_config: Config) -> Self {
        let registry = ConnectionRegistry::new();
        let event_publisher = EventPublisher::new().with_handler(Arc::new(
            RealtimeDomainEventHandler::new(registry.clone()),
        ));
        Self::with_parts(app_config, registry, event_publisher)
    }

    pub fn with_parts(
        app_config: Config,
        registry: ConnectionRegistry,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            config: app_config,
            registry,
            event_publisher: Arc::new(event_publisher),
        }
    }
}
