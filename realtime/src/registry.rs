use crate::connection::{ClientId, Connection, ConnectionHandle, UserId};
use crate::message::{EventType, ServerMessage};
use log::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type ConnectionSet = HashMap<ConnectionHandle, Arc<Connection>>;

/// Both indices live behind one lock so they can never disagree.
#[derive(Default)]
struct Indices {
    /// Primary index: every live connection, keyed by its client id.
    by_client_id: HashMap<ClientId, ConnectionSet>,

    /// Routing index: authenticated connections keyed by user. Anonymous
    /// connections never appear here.
    by_user_id: HashMap<UserId, ConnectionSet>,
}

impl Indices {
    fn insert(&mut self, connection: &Arc<Connection>) {
        self.by_client_id
            .entry(connection.client_id().clone())
            .or_default()
            .insert(connection.handle(), Arc::clone(connection));

        if let Some(user_id) = connection.user_id() {
            self.by_user_id
                .entry(user_id)
                .or_default()
                .insert(connection.handle(), Arc::clone(connection));
        }
    }

    /// Removes the connection from both indices and prunes emptied keys.
    /// Returns whether it was present in either one.
    fn remove(&mut self, connection: &Connection) -> bool {
        let handle = connection.handle();
        let removed_by_client =
            remove_from(&mut self.by_client_id, connection.client_id(), handle);
        let removed_by_user = match connection.user_id() {
            Some(user_id) => remove_from(&mut self.by_user_id, &user_id, handle),
            None => false,
        };
        removed_by_client || removed_by_user
    }
}

fn remove_from<K>(index: &mut HashMap<K, ConnectionSet>, key: &K, handle: ConnectionHandle) -> bool
where
    K: std::hash::Hash + Eq,
{
    let Some(set) = index.get_mut(key) else {
        return false;
    };
    let removed = set.remove(&handle).is_some();
    if set.is_empty() {
        index.remove(key);
    }
    removed
}

/// Registry of live connections, indexed by client id and by user id.
///
/// The registry is a cheap handle: clones share the same state, so one
/// instance built at start-up can be handed to the HTTP layer and to every
/// domain service that needs to notify users.
///
/// Mutations take the write lock. Broadcasts take the read lock only long
/// enough to snapshot the target set, then write to each connection on its own
/// task, so a slow client never holds up registration of other connections.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    indices: Arc<RwLock<Indices>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to the client id index and, when it belongs to a
    /// user, to that user's set. Registering the same connection twice is a no-op.
    pub async fn register(&self, connection: &Arc<Connection>) {
        if connection.is_closed() {
            debug!(
                "Skipping registration of closed connection {} ({})",
                connection.handle(),
                connection.client_id()
            );
            return;
        }

        let mut indices = self.indices.write().await;
        indices.insert(connection);

        debug!(
            "Registered connection {} client_id={} user_id={:?}",
            connection.handle(),
            connection.client_id(),
            connection.user_id()
        );
        if let Some(user_id) = connection.user_id() {
            trace!(
                "User {user_id} now has {} live connection(s)",
                indices.by_user_id.get(&user_id).map_or(0, |set| set.len())
            );
        }
    }

    /// Removes a connection from both indices and closes its transport.
    ///
    /// Safe to call for a connection that was never registered or was already
    /// removed; in that case the maps are left untouched. Returns whether the
    /// connection was found.
    pub async fn unregister(&self, connection: &Connection) -> bool {
        let removed = self.indices.write().await.remove(connection);
        connection.close().await;

        if removed {
            debug!(
                "Unregistered connection {} client_id={} user_id={:?}",
                connection.handle(),
                connection.client_id(),
                connection.user_id()
            );
        } else {
            trace!(
                "Unregister for unknown connection {} ({}) ignored",
                connection.handle(),
                connection.client_id()
            );
        }
        removed
    }

    /// Sends `message` to every live connection of `user_id` without waiting for delivery.
    ///
    /// The message is serialized once. Each write runs on its own task; a
    /// failed write unregisters that connection and is otherwise only logged.
    /// Returns the number of sends dispatched, which is 0 when the user has no
    /// live connections.
    pub async fn broadcast_to_user(&self, user_id: UserId, message: &ServerMessage) -> usize {
        let targets: Vec<Arc<Connection>> = {
            let indices = self.indices.read().await;
            match indices.by_user_id.get(&user_id) {
                Some(set) => set.values().cloned().collect(),
                None => Vec::new(),
            }
        };

        if targets.is_empty() {
            trace!(
                "No live connections for user {user_id}, dropping {}",
                message.event_type()
            );
            return 0;
        }

        let payload: Arc<str> = match message.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                error!("Failed to serialize {}: {e}", message.event_type());
                return 0;
            }
        };

        debug!(
            "Dispatching {} to {} connection(s) of user {user_id}",
            message.event_type(),
            targets.len()
        );

        let dispatched = targets.len();
        for connection in targets {
            let registry = self.clone();
            let payload = Arc::clone(&payload);
            tokio::spawn(async move {
                if let Err(e) = connection.send_text(&payload).await {
                    warn!(
                        "Failed to send to connection {} of user {user_id}: {e}. Unregistering it.",
                        connection.handle()
                    );
                    registry.unregister(&connection).await;
                }
            });
        }
        dispatched
    }

    /// Closes every live connection and empties both indices. Used on shutdown.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<Connection>> = {
            let mut indices = self.indices.write().await;
            indices.by_user_id.clear();
            indices
                .by_client_id
                .drain()
                .flat_map(|(_, set)| set.into_values())
                .collect()
        };

        for connection in &drained {
            connection.close().await;
        }
        info!("Closed {} live connection(s)", drained.len());
        drained.len()
    }

    pub async fn user_connection_count(&self, user_id: UserId) -> usize {
        self.indices
            .read()
            .await
            .by_user_id
            .get(&user_id)
            .map_or(0, |set| set.len())
    }

    pub async fn client_connection_count(&self, client_id: &ClientId) -> usize {
        self.indices
            .read()
            .await
            .by_client_id
            .get(client_id)
            .map_or(0, |set| set.len())
    }

    /// Total number of live connections, anonymous ones included.
    pub async fn connection_count(&self) -> usize {
        self.indices
            .read()
            .await
            .by_client_id
            .values()
            .map(|set| set.len())
            .sum()
    }

    /// Number of users with at least one live connection.
    pub async fn user_count(&self) -> usize {
        self.indices.read().await.by_user_id.len()
    }

    /// Number of distinct client ids currently indexed.
    pub async fn client_id_count(&self) -> usize {
        self.indices.read().await.by_client_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::RecordingTransport;
    use events::RideStatus;
    use std::time::Duration;

    fn ride_started(ride_id: u64) -> ServerMessage {
        ServerMessage::RideStatusUpdate {
            ride_id,
            status: RideStatus::Started,
        }
    }

    /// Lets spawned send tasks run to completion.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fn user_connection(user_id: UserId, transport: Arc<RecordingTransport>) -> Arc<Connection> {
        Connection::new(ClientId::for_user(user_id), Some(user_id), transport)
    }

    #[tokio::test]
    async fn test_register_indexes_by_client_and_user() {
        let registry = ConnectionRegistry::new();
        let connection = user_connection(7, RecordingTransport::new());

        registry.register(&connection).await;

        assert_eq!(registry.user_connection_count(7).await, 1);
        assert_eq!(
            registry
                .client_connection_count(&ClientId::for_user(7))
                .await,
            1
        );
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_registering_twice_does_not_duplicate() {
        let registry = ConnectionRegistry::new();
        let connection = user_connection(7, RecordingTransport::new());

        registry.register(&connection).await;
        registry.register(&connection).await;

        assert_eq!(registry.user_connection_count(7).await, 1);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_anonymous_connections_are_not_user_indexed() {
        let registry = ConnectionRegistry::new();
        let connection = Connection::new(ClientId::anonymous(), None, RecordingTransport::new());

        registry.register(&connection).await;

        assert_eq!(registry.connection_count().await, 1);
        assert_eq!(registry.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_unregister_prunes_empty_keys_and_closes() {
        let registry = ConnectionRegistry::new();
        let transport = RecordingTransport::new();
        let connection = user_connection(3, transport.clone());

        registry.register(&connection).await;
        assert!(registry.unregister(&connection).await);

        assert_eq!(registry.user_count().await, 0);
        assert_eq!(registry.client_id_count().await, 0);
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn test_unregister_twice_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        let transport = RecordingTransport::new();
        let connection = user_connection(3, transport.clone());

        registry.register(&connection).await;
        assert!(registry.unregister(&connection).await);
        assert!(!registry.unregister(&connection).await);
        assert!(!registry.unregister(&connection).await);

        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn test_unregister_of_never_registered_connection_is_safe() {
        let registry = ConnectionRegistry::new();
        let other = user_connection(5, RecordingTransport::new());
        registry.register(&other).await;

        let stranger = user_connection(5, RecordingTransport::new());
        assert!(!registry.unregister(&stranger).await);

        assert_eq!(registry.user_connection_count(5).await, 1);
    }

    #[tokio::test]
    async fn test_unregister_keeps_other_connections_of_same_user_and_client_id() {
        let registry = ConnectionRegistry::new();
        let phone = user_connection(9, RecordingTransport::new());
        let tablet = user_connection(9, RecordingTransport::new());

        registry.register(&phone).await;
        registry.register(&tablet).await;
        registry.unregister(&phone).await;

        assert_eq!(registry.user_connection_count(9).await, 1);
        assert_eq!(
            registry
                .client_connection_count(&ClientId::for_user(9))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn test_closed_connections_are_not_registered() {
        let registry = ConnectionRegistry::new();
        let connection = user_connection(4, RecordingTransport::new());
        connection.close().await;

        registry.register(&connection).await;

        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_interleaved_register_unregister_leaves_exact_state() {
        let registry = ConnectionRegistry::new();
        let connections: Vec<_> = (0..12)
            .map(|i| user_connection(i % 3 + 1, RecordingTransport::new()))
            .collect();

        for connection in &connections {
            registry.register(connection).await;
        }
        for connection in connections.iter().step_by(2) {
            registry.unregister(connection).await;
        }

        for user_id in 1..=3 {
            let expected = connections
                .iter()
                .skip(1)
                .step_by(2)
                .filter(|c| c.user_id() == Some(user_id))
                .count();
            assert_eq!(registry.user_connection_count(user_id).await, expected);
        }
        assert_eq!(registry.connection_count().await, 6);

        for connection in connections.iter().skip(1).step_by(2) {
            registry.unregister(connection).await;
        }
        assert_eq!(registry.user_count().await, 0);
        assert_eq!(registry.client_id_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_to_user_without_connections_is_silent() {
        let registry = ConnectionRegistry::new();
        let bystander = RecordingTransport::new();
        registry.register(&user_connection(1, bystander.clone())).await;

        assert_eq!(registry.broadcast_to_user(2, &ride_started(1)).await, 0);
        settle().await;

        assert_eq!(bystander.attempts(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_device_of_the_user() {
        let registry = ConnectionRegistry::new();
        let a = RecordingTransport::new();
        let b = RecordingTransport::new();
        registry.register(&user_connection(7, a.clone())).await;
        registry.register(&user_connection(7, b.clone())).await;

        assert_eq!(registry.broadcast_to_user(7, &ride_started(42)).await, 2);
        settle().await;

        let expected = r#"{"type":"RIDE_STATUS_UPDATE","payload":{"ride_id":42,"status":"started"}}"#;
        assert_eq!(a.sent(), vec![expected.to_string()]);
        assert_eq!(b.sent(), vec![expected.to_string()]);
    }

    #[tokio::test]
    async fn test_broadcast_never_reaches_anonymous_connections() {
        let registry = ConnectionRegistry::new();
        let anonymous = RecordingTransport::new();
        registry
            .register(&Connection::new(ClientId::anonymous(), None, anonymous.clone()))
            .await;

        for user_id in [0, 1, 2, 42] {
            registry.broadcast_to_user(user_id, &ride_started(1)).await;
        }
        settle().await;

        assert_eq!(anonymous.attempts(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_does_not_block_others_and_unregisters_the_failure() {
        let registry = ConnectionRegistry::new();
        let healthy: Vec<_> = (0..3).map(|_| RecordingTransport::new()).collect();
        let broken = RecordingTransport::failing();

        for transport in &healthy {
            registry.register(&user_connection(7, transport.clone())).await;
        }
        registry.register(&user_connection(7, broken.clone())).await;

        assert_eq!(registry.broadcast_to_user(7, &ride_started(1)).await, 4);
        settle().await;

        for transport in &healthy {
            assert_eq!(transport.sent().len(), 1);
        }
        assert_eq!(broken.attempts(), 1);
        assert_eq!(broken.closes(), 1);
        assert_eq!(registry.user_connection_count(7).await, 3);

        assert_eq!(registry.broadcast_to_user(7, &ride_started(2)).await, 3);
        settle().await;
        assert_eq!(broken.attempts(), 1);
        for transport in &healthy {
            assert_eq!(transport.sent().len(), 2);
        }
    }

    #[tokio::test]
    async fn test_broadcast_after_unregister_attempts_nothing() {
        let registry = ConnectionRegistry::new();
        let transport = RecordingTransport::new();
        let connection = user_connection(3, transport.clone());

        registry.register(&connection).await;
        registry.unregister(&connection).await;

        assert_eq!(registry.broadcast_to_user(3, &ride_started(1)).await, 0);
        settle().await;
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let registry = ConnectionRegistry::new();
        let handle = registry.clone();

        handle
            .register(&user_connection(8, RecordingTransport::new()))
            .await;

        assert_eq!(registry.user_connection_count(8).await, 1);
    }

    #[tokio::test]
    async fn test_independent_registries_do_not_share_state() {
        let first = ConnectionRegistry::new();
        let second = ConnectionRegistry::new();

        first
            .register(&user_connection(8, RecordingTransport::new()))
            .await;

        assert_eq!(second.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_all_drains_everything() {
        let registry = ConnectionRegistry::new();
        let transports: Vec<_> = (0..3).map(|_| RecordingTransport::new()).collect();
        registry
            .register(&user_connection(1, transports[0].clone()))
            .await;
        registry
            .register(&user_connection(2, transports[1].clone()))
            .await;
        registry
            .register(&Connection::new(
                ClientId::anonymous(),
                None,
                transports[2].clone(),
            ))
            .await;

        assert_eq!(registry.close_all().await, 3);

        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(registry.user_count().await, 0);
        for transport in &transports {
            assert_eq!(transport.closes(), 1);
        }
    }
}
