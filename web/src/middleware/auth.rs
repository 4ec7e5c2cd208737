use crate::extractors::authenticated_user::AuthenticatedUser;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use log::*;
use service::AppState;

/// Attaches an `AuthenticatedUser` to the request when it carries a valid
/// `Authorization: Bearer <jwt>` header.
///
/// Never rejects: requests without a token, or with one that fails
/// verification, continue unauthenticated and the handler falls back to the
/// client-supplied id.
pub async fn identify_bearer(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let authenticated = bearer_token(&request).and_then(|token| {
        match domain::jwt::authenticate(&app_state.config, token) {
            Ok(user_id) => Some(user_id),
            Err(e) => {
                debug!("Ignoring unusable bearer token: {e}");
                None
            }
        }
    });

    if let Some(user_id) = authenticated {
        trace!("Bearer token identifies user {user_id}");
        request.extensions_mut().insert(AuthenticatedUser(user_id));
    }

    next.run(request).await
}

fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}
