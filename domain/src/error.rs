//! Error types for the `domain` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
///
/// Mirrors the layered error design used across the workspace: a `source`
/// holding whatever lower-level error caused this one, and an `error_kind` tree
/// that `web` maps onto HTTP status codes without depending on the lower layers.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    /// Input that violates a domain rule, e.g. a coordinate out of range.
    Invalid(String),
    /// A required configuration value is missing.
    Config,
}

/// Errors caused by what a caller presented to us.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// A bearer token that is malformed, expired, or signed with another key.
    Unauthenticated,
}

impl Error {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Invalid(reason.into())),
        }
    }

    pub fn config() -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }

    pub fn unauthenticated() -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::External(ExternalErrorKind::Unauthenticated),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Unauthenticated),
        }
    }
}
