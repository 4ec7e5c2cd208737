use axum::extract::OptionalFromRequestParts;
use axum::http::request::Parts;
use events::Id;
use std::convert::Infallible;

/// A user identity established by the bearer-token middleware earlier in the
/// request. Absent for anonymous requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AuthenticatedUser(pub Id);

// Only ever extracted as `Option<AuthenticatedUser>`: a missing identity is
// not a rejection on any route we serve.
impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthenticatedUser>().copied())
    }
}
