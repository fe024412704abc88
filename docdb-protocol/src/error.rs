//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or validation.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed header: need 16 bytes, got {len}")]
    MalformedHeader { len: usize },

    #[error("unknown op code: {0}")]
    UnknownOpCode(u32),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: u32, max: u32 },

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,

    #[error("invalid UUID format: {0}")]
    InvalidUuidFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::MalformedHeader { len: 7 };
        assert!(err.to_string().contains("16"));
        assert!(err.to_string().contains('7'));

        let err = ProtocolError::UnknownOpCode(9999);
        assert!(err.to_string().contains("9999"));

        let err = ProtocolError::MessageTooLarge {
            size: 100,
            max: 50,
        };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::InvalidUtf8;
        assert!(err.to_string().contains("UTF-8"));

        let err = ProtocolError::InvalidUuidFormat("expected hex".to_string());
        assert!(err.to_string().contains("expected hex"));
    }
}
