//! Error types for medstore.
//!
//! Defines the main error enum used throughout the application. Service
//! failures are classified into kinds so callers can branch on them without
//! matching on message text.

use thiserror::Error;

/// Main error type for medstore operations.
#[derive(Error, Debug)]
pub enum MedstoreError {
    /// The bucket, object, version or query does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials are missing or lack the required permission.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The service rejected the request because of rate limiting.
    #[error("Throttled: {0}")]
    Throttled(String),

    /// The service rejected the request as malformed (bad SQL, bad parameter).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request never produced a service response (network, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other failure reported by the service.
    #[error("Service error: {0}")]
    Service(String),

    /// An Athena query reached a terminal state other than success.
    #[error(
        "Query {execution_id} ended with state {state}: {}",
        .reason.as_deref().unwrap_or("no reason given")
    )]
    QueryFailed {
        execution_id: String,
        state: String,
        reason: Option<String>,
    },

    /// Waiting for a query exceeded the configured timeout.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The operation was cancelled by the user.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Configuration errors (missing config file, missing bucket role, bad JSON).
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input rejected before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Local filesystem errors.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MedstoreError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an invalid input error with the given message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true for errors that mean the target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Not Found",
            Self::PermissionDenied(_) => "Permission Denied",
            Self::Throttled(_) => "Throttled",
            Self::InvalidRequest(_) => "Invalid Request",
            Self::Transport(_) => "Transport Error",
            Self::Service(_) => "Service Error",
            Self::QueryFailed { .. } => "Query Failed",
            Self::Timeout(_) => "Timeout",
            Self::Cancelled(_) => "Cancelled",
            Self::Config(_) => "Configuration Error",
            Self::InvalidInput(_) => "Invalid Input",
            Self::Io(_) => "I/O Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

impl From<std::io::Error> for MedstoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type alias using MedstoreError.
pub type Result<T> = std::result::Result<T, MedstoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = MedstoreError::config("missing key 'data_bucket'");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing key 'data_bucket'"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_error_display_query_failed_with_reason() {
        let err = MedstoreError::QueryFailed {
            execution_id: "abc-123".to_string(),
            state: "FAILED".to_string(),
            reason: Some("line 1:8: mismatched input".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Query abc-123 ended with state FAILED: line 1:8: mismatched input"
        );
        assert_eq!(err.category(), "Query Failed");
    }

    #[test]
    fn test_error_display_query_failed_without_reason() {
        let err = MedstoreError::QueryFailed {
            execution_id: "abc-123".to_string(),
            state: "CANCELLED".to_string(),
            reason: None,
        };
        assert!(err.to_string().ends_with("no reason given"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err: MedstoreError = io.into();
        assert_eq!(err.category(), "I/O Error");
        assert!(err.to_string().contains("missing.csv"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(MedstoreError::NotFound("bucket".into()).is_not_found());
        assert!(!MedstoreError::Throttled("slow down".into()).is_not_found());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MedstoreError>();
    }
}
