//! Error types for the studyhub API client.
//!
//! # Design
//! `Request` is the only variant built from an HTTP response: any non-2xx
//! status, with a bounded human-readable message. `Transport` covers failures
//! before a response exists and is never folded into `Request`. Every variant
//! owns plain strings so the type is `Clone`; a coalesced read hands the same
//! outcome to each of its waiters.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("{status}: {message}")]
    Request { status: u16, message: String },

    /// No response was received (DNS, refused connection, timeout).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The request body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A payload could not be viewed as the requested type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A query key that does not name exactly one request path.
    #[error("invalid query key: {0}")]
    InvalidQueryKey(String),
}

impl ClientError {
    /// HTTP status of a `Request` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_displays_status_and_message() {
        let err = ClientError::Request {
            status: 500,
            message: "model unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "500: model unavailable");
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn transport_error_has_no_status() {
        let err = ClientError::Transport("connection refused".to_string());
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "transport failed: connection refused");
    }
}
