//! Bearer tokens identifying a user to the realtime endpoint.
//!
//! Tokens are HS256 JWTs carrying `{user_id, exp}`, signed with the configured
//! `jwt_secret`. Admin tokens issued by other tooling may carry a `role` and no
//! `user_id`; those never resolve to a user here.

use crate::error::Error;
use crate::Id;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};
use service::config::Config;

#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaims {
    #[serde(default)]
    pub user_id: Id,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Issues a token for `user_id` valid for `ttl`.
pub fn generate_user_token(config: &Config, user_id: Id, ttl: Duration) -> Result<String, Error> {
    let secret = config.jwt_secret().ok_or_else(|| {
        warn!("Cannot sign a user token without a configured jwt_secret");
        Error::config()
    })?;

    let claims = UserClaims {
        user_id,
        exp: (Utc::now() + ttl).timestamp(),
        role: None,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Verifies `token` and returns the user it names.
///
/// Fails when no secret is configured, when the signature or expiry do not
/// check out, or when the claims name no user.
pub fn authenticate(config: &Config, token: &str) -> Result<Id, Error> {
    let secret = config.jwt_secret().ok_or_else(Error::config)?;

    let data = decode::<UserClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;

    match data.claims.user_id {
        0 => Err(Error::unauthenticated()),
        user_id => Ok(user_id),
    }
}
