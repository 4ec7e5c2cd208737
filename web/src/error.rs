use std::error::Error as StdError;

use axum::extract::rejection::QueryRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

/// Failures that end a request before any connection is registered.
#[derive(Debug)]
pub enum Error {
    /// The query string could not be decoded into the expected parameters.
    InvalidQuery(QueryRejection),
    /// The request is not a valid WebSocket upgrade.
    InvalidUpgrade(WebSocketUpgradeRejection),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::InvalidQuery(rejection) => Some(rejection),
            Error::InvalidUpgrade(rejection) => Some(rejection),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        match self {
            Error::InvalidQuery(rejection) => write!(fmt, "invalid query: {}", rejection.body_text()),
            Error::InvalidUpgrade(rejection) => {
                write!(fmt, "invalid upgrade: {}", rejection.body_text())
            }
        }
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        debug!("Rejecting request: {self}");
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::InvalidQuery(rejection)
    }
}

impl From<WebSocketUpgradeRejection> for Error {
    fn from(rejection: WebSocketUpgradeRejection) -> Self {
        Error::InvalidUpgrade(rejection)
    }
}
