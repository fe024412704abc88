//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] docdb_protocol::ProtocolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not connected")]
    NotConnected,

    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("invalid cursor response: {0}")]
    InvalidCursorResponse(String),

    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },
}

impl ClientError {
    /// Returns whether this error is worth a manual retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::Timeout | ClientError::ConnectionClosed
        )
    }

    /// Wraps a connect sub-step failure, preserving its message.
    pub(crate) fn into_connection_failed(self) -> ClientError {
        match self {
            ClientError::ConnectionFailed { .. } => self,
            other => ClientError::ConnectionFailed {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::ConnectionClosed.is_retryable());
        assert!(!ClientError::NotConnected.is_retryable());
        assert!(!ClientError::Server {
            code: 11600,
            message: "shutting down".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_connection_failed_preserves_message() {
        let err = ClientError::Timeout.into_connection_failed();
        match err {
            ClientError::ConnectionFailed { message } => {
                assert!(message.contains("timeout"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
