//! Error types for the `sse` crate.
//!
//! Delivery itself never fails with an error: transport and auth failures
//! are outcomes, not errors. Errors only come out of producer I/O, and are
//! logged and swallowed at the producer boundary.
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// Connecting to or reading from a remote endpoint failed.
    Network,
    /// The remote endpoint answered with a non-success HTTP status.
    UnexpectedStatus(u16),
    Serialization,
    Other(String),
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Network => write!(f, "Network error")?,
            ErrorKind::UnexpectedStatus(status) => write!(f, "Unexpected HTTP status {status}")?,
            ErrorKind::Serialization => write!(f, "Serialization error")?,
            ErrorKind::Other(msg) => write!(f, "{msg}")?,
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors building the client happen before any network call is made.
        let error_kind = if err.is_builder() {
            ErrorKind::Other("Failed to build HTTP client".to_string())
        } else if let Some(status) = err.status() {
            ErrorKind::UnexpectedStatus(status.as_u16())
        } else {
            ErrorKind::Network
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
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
