//! Error types for the shop API client.
//!
//! # Design
//! Every remote call resolves to `Outcome<T>`, an alias for
//! `Result<T, ApiError>`. `ApiError` is the failure half: transport problems,
//! non-2xx statuses and undecodable bodies each get their own variant so
//! callers can branch without string matching.
//!
//! `UninitializedError` is deliberately not an `ApiError` variant. Asking the
//! process-wide accessor for a session before one exists is a programming
//! error, and keeping it in its own type stops it from being handled as an
//! ordinary request failure.

use thiserror::Error;

/// Result of every remote operation.
pub type Outcome<T> = Result<T, ApiError>;

/// Failures produced by the request executor and session methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response: connection refused,
    /// timeout, DNS failure or broken I/O.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status. `message` is the status
    /// text; the response body is never parsed on this path.
    #[error("HTTP {status}: {message}")]
    Protocol { status: u16, message: String },

    /// A 2xx response whose body was missing or could not be decoded into
    /// the expected shape.
    #[error("unexpected response body: {0}")]
    Envelope(String),

    /// The request could not be built locally.
    #[error("invalid request: {0}")]
    Request(String),

    /// The remote call succeeded but its local bookkeeping failed.
    #[error("token storage failure: {0}")]
    Storage(String),

    /// The owning session was destroyed while the call awaited the network.
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// HTTP status of a `Protocol` failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Returned by `global::get_instance` before `global::initialize` succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("shop SDK is not initialized; call global::initialize first")]
pub struct UninitializedError;

/// Failures while constructing a session from a `Config`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of the key-value storage behind the token store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no platform data directory available for token storage")]
    NoDataDir,

    #[error("storage I/O failure at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt storage file {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_exposes_status() {
        let err = ApiError::Protocol {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
        assert_eq!(ApiError::Cancelled.status(), None);
    }

    #[test]
    fn uninitialized_error_names_the_fix() {
        assert!(UninitializedError.to_string().contains("initialize"));
    }
}
