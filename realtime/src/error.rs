//! Error types for the `realtime` layer.
use std::error::Error as StdError;
use std::fmt;

/// Error raised while delivering a frame to one connection.
///
/// These errors never reach the producer that triggered a broadcast. The
/// registry logs them and unregisters the failing connection. The `source`
/// field holds the transport's own error when there is one.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// The kinds of failures a connection can report.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// The underlying socket rejected the write.
    Transport,
    /// The connection was already closed locally.
    Closed,
    /// The write did not complete within the configured bound.
    Timeout,
    /// A message could not be encoded to JSON.
    Serialization,
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    /// Wraps an error coming out of a concrete transport implementation.
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Error {
            source: Some(err.into()),
            error_kind: ErrorKind::Transport,
        }
    }

    pub fn closed() -> Self {
        Self::new(ErrorKind::Closed)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            ErrorKind::Transport => "transport error",
            ErrorKind::Closed => "connection closed",
            ErrorKind::Timeout => "write timed out",
            ErrorKind::Serialization => "serialization error",
        };
        f.write_str(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Realtime Error: {}: {source}", self.error_kind),
            None => write!(f, "Realtime Error: {}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Serialization,
        }
    }
}
