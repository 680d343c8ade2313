use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl RelayError {
    pub fn to_error_code(&self) -> &'static str {
        match self {
            RelayError::Database(_) => "DATABASE_ERROR",
            RelayError::NotFound { .. } => "NOT_FOUND",
            RelayError::InvalidInput(_) => "INVALID_INPUT",
            RelayError::Transport(_) => "TRANSPORT_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.to_error_code().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_and_code() {
        let err = RelayError::NotFound {
            kind: "Playlist",
            id: 7,
        };
        assert_eq!(err.to_string(), "Playlist not found: 7");
        assert_eq!(err.to_error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_error_response_shape() {
        let err = RelayError::InvalidInput("bad value".to_string());
        let json = serde_json::to_value(err.to_error_response()).unwrap();
        assert_eq!(json["code"], "INVALID_INPUT");
        assert_eq!(json["error"], "Invalid input: bad value");
    }

    #[test]
    fn test_unmapped_errors_are_internal() {
        let err = RelayError::Io(std::io::Error::other("disk"));
        assert_eq!(err.to_error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_anyhow_context_chain_is_kept() {
        use anyhow::Context;
        let inner: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("address in use"));
        let err: RelayError = inner.context("Failed to bind").unwrap_err().into();
        assert_eq!(err.to_string(), "Failed to bind: address in use");
        assert_eq!(err.to_error_code(), "INTERNAL_ERROR");
    }
}
