use thiserror::Error;

use crate::alerts::SubscribeError;
use crate::api::ApiError;
use crate::blockchain::{CodecError, NodeError, PollerError, ProcessError};
use crate::database::DbError;
use crate::price::PriceError;

/// Main error type for the alert relay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessError),

    #[error("Poller error: {0}")]
    Poller(#[from] PollerError),

    #[error("Address codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Subscription error: {0}")]
    Subscribe(#[from] SubscribeError),

    #[error("Price source error: {0}")]
    Price(#[from] PriceError),

    #[error("Server error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("System error: {0}")]
    System(#[from] SystemError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// System-level errors
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Signal handling failed: {0}")]
    Signal(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, RelayError>;

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// High priority errors that affect functionality
    High,
    /// Medium priority errors that may affect performance
    Medium,
    /// Low priority errors that are mostly informational
    Low,
}

impl RelayError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RelayError::Config(_) => ErrorSeverity::Critical,
            RelayError::Database(DbError::Connection(_)) => ErrorSeverity::Critical,
            RelayError::Api(ApiError::Bind { .. }) => ErrorSeverity::Critical,
            RelayError::System(SystemError::Signal(_)) => ErrorSeverity::Critical,

            RelayError::Database(_) => ErrorSeverity::High,
            RelayError::Poller(_) => ErrorSeverity::High,
            RelayError::Node(NodeError::Connection(_)) => ErrorSeverity::High,

            RelayError::Node(_) => ErrorSeverity::Medium,
            RelayError::Price(PriceError::Http(_)) => ErrorSeverity::Medium,
            RelayError::Processing(_) => ErrorSeverity::Medium,

            RelayError::Codec(_) => ErrorSeverity::Low,
            RelayError::Subscribe(_) => ErrorSeverity::Low,
            RelayError::Price(_) => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }

    /// Check if the error is transient and the unit of work can be retried
    pub fn is_recoverable(&self) -> bool {
        match self {
            RelayError::Node(_) => true,
            RelayError::Price(_) => true,
            RelayError::Database(DbError::Operation(_)) => true,
            RelayError::Database(DbError::Connection(_)) => true,

            RelayError::Config(_) => false,
            RelayError::Codec(_) => false,
            RelayError::Subscribe(_) => false,
            RelayError::Database(DbError::Regression { .. }) => false,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let critical_error = RelayError::Config(ConfigError::FileNotFound("relay.toml".to_string()));
        assert_eq!(critical_error.severity(), ErrorSeverity::Critical);

        let high_error = RelayError::Node(NodeError::Connection("refused".to_string()));
        assert_eq!(high_error.severity(), ErrorSeverity::High);

        let medium_error = RelayError::Node(NodeError::Timeout { seconds: 30 });
        assert_eq!(medium_error.severity(), ErrorSeverity::Medium);

        let low_error = RelayError::Codec(CodecError::ChecksumTooShort { length: 3 });
        assert_eq!(low_error.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_error_recoverability() {
        let recoverable = RelayError::Node(NodeError::Timeout { seconds: 30 });
        assert!(recoverable.is_recoverable());

        let non_recoverable = RelayError::Config(ConfigError::FileNotFound("relay.toml".to_string()));
        assert!(!non_recoverable.is_recoverable());

        let regression = RelayError::Database(DbError::Regression { current: 10, attempted: 9 });
        assert!(!regression.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = RelayError::Codec(CodecError::InvalidCharacter { character: '0', position: 4 });
        assert_eq!(
            format!("{}", error),
            "Address codec error: Invalid base58 character '0' at position 4"
        );
    }

    #[test]
    fn test_error_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Access denied");
        let relay_error = RelayError::System(SystemError::FileSystem(io_error));

        assert!(format!("{}", relay_error).contains("File system error"));
    }
}
