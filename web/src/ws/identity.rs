use events::Id;
use log::*;
use realtime::{ClientId, UserId};

/// Who a new WebSocket connection belongs to, decided before it is registered.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Identity {
    pub(crate) client_id: ClientId,
    pub(crate) user_id: Option<UserId>,
}

impl Identity {
    /// Resolves the connection's identity.
    ///
    /// The user is taken from, in order: an identity already authenticated on
    /// the request, a `user_<n>` pattern in the client-supplied id, or nobody.
    /// The client id is the one the client asked for when non-empty, else
    /// `user_<n>` for an authenticated user, else a fresh anonymous id.
    pub(crate) fn resolve(authenticated: Option<Id>, requested_client_id: Option<&str>) -> Self {
        let authenticated = authenticated.filter(|id| *id > 0);
        let requested = requested_client_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ClientId::new);

        let user_id = authenticated.or_else(|| {
            let embedded = requested.as_ref().and_then(ClientId::embedded_user_id);
            if let Some(user_id) = embedded {
                debug!("User {user_id} taken from client id");
            }
            embedded
        });

        let client_id = match (requested, authenticated) {
            (Some(requested), _) => requested,
            (None, Some(user_id)) => ClientId::for_user(user_id),
            (None, None) => ClientId::anonymous(),
        };

        Identity { client_id, user_id }
    }
}
