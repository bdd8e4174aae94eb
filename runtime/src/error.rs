//! Error types for the async request client and the query/mutation layer.

use loanguard_core::ApiError;
use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures raised by a `Transport` before a response was received.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network request failed (DNS, connection refused, reset, ...)
    #[error("Network request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The request could not be mapped onto the HTTP stack
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Backend not reachable, raised by non-reqwest transports
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced to callers of `Api` and stored in query/mutation state.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure; no response was received
    #[error(transparent)]
    Network(#[from] TransportError),

    /// Serialization failure or rejected upload. For uploads the message is
    /// exactly the server's `error` field.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The caller's cancellation token fired before the response arrived
    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    /// Server-supplied message of a rejected upload.
    pub fn upload_message(&self) -> Option<&str> {
        match self {
            ClientError::Api(ApiError::Upload { message, .. }) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_displays_server_message_verbatim() {
        let err = ClientError::from(ApiError::Upload {
            status: 400,
            message: "bad file".to_string(),
        });
        assert_eq!(err.to_string(), "bad file");
        assert_eq!(err.upload_message(), Some("bad file"));
        assert!(!err.is_network());
    }

    #[test]
    fn transport_errors_are_network_errors() {
        let err = ClientError::from(TransportError::Unavailable("connection refused".to_string()));
        assert!(err.is_network());
        assert_eq!(err.to_string(), "Backend unavailable: connection refused");
        assert_eq!(err.upload_message(), None);
    }

    #[test]
    fn cancelled_is_its_own_kind() {
        assert!(ClientError::Cancelled.is_cancelled());
        assert_eq!(ClientError::Cancelled.to_string(), "Request cancelled");
    }
}
