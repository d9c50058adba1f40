//! Error types for the notification service.

use thiserror::Error;

/// Result type alias using the notification service's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for notification operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A backing dependency (store, broker) is unreachable
    #[error("Dependency unavailable: {0}")]
    DependencyDown(String),

    /// Event decoded but violates the event model invariants
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Message broker error
    #[error("Broker error: {0}")]
    Broker(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors caused by a malformed or invariant-violating event.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Error::InvalidEvent(_) | Error::InvalidInput(_))
    }

    /// True when the backing store or broker could not be reached.
    pub fn is_dependency_down(&self) -> bool {
        matches!(self, Error::DependencyDown(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Error::DependencyDown(e.to_string()),
            other => Error::Database(other),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_event() {
        let err = Error::InvalidEvent("job event without username".to_string());
        assert_eq!(err.to_string(), "Invalid event: job event without username");
    }

    #[test]
    fn test_error_display_dependency_down() {
        let err = Error::DependencyDown("connection refused".to_string());
        assert_eq!(err.to_string(), "Dependency unavailable: connection refused");
    }

    #[test]
    fn test_error_display_broker() {
        let err = Error::Broker("channel closed".to_string());
        assert_eq!(err.to_string(), "Broker error: channel closed");
    }

    #[test]
    fn test_sqlx_pool_timeout_is_dependency_down() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_dependency_down());
        assert!(!err.is_invalid());
    }

    #[test]
    fn test_sqlx_io_is_dependency_down() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: Error = sqlx::Error::Io(io).into();
        assert!(matches!(err, Error::DependencyDown(_)));
    }

    #[test]
    fn test_sqlx_row_not_found_stays_database() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_dependency_down());
    }

    #[test]
    fn test_invalid_categories() {
        assert!(Error::InvalidEvent("x".into()).is_invalid());
        assert!(Error::InvalidInput("x".into()).is_invalid());
        assert!(!Error::Internal("x".into()).is_invalid());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().starts_with("Serialization error:"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
