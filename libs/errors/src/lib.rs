//! Unified error handling for the recipe workspace
//!
//! One error type shared by the model, the link library and the CLI, so that
//! callers only ever branch on `RecipeError`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ErrorInfo - serializable error description
// ============================================================================

/// Standard error information for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Closest HTTP status
    pub code: u16,
    /// Stable classification code, e.g. `HTTP_CLIENT_ERROR`
    pub error_code: String,
    /// Error message
    pub message: String,
    /// Whether trying the same call again may succeed
    pub retryable: bool,
}

impl ErrorInfo {
    /// Create a new ErrorInfo with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: 500,
            error_code: "OTHER_ERROR".to_string(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Set the error code
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn with_error_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = error_code.into();
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

// ============================================================================
// RecipeError - Main error type
// ============================================================================

/// Main error type for all recipe crates
#[derive(Debug, Error)]
pub enum RecipeError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // ======================================
    // Protocol & Communication Errors
    // ======================================
    #[error("Protocol error: {protocol}: {message}")]
    Protocol { protocol: String, message: String },

    #[error("Connection failed: {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Channel join rejected: {channel}: {reason}")]
    JoinRejected { channel: String, reason: String },

    // ======================================
    // HTTP Errors
    // ======================================
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // ======================================
    // Validation Errors
    // ======================================
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid parameter: {param}: {reason}")]
    InvalidParameter { param: String, reason: String },

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ======================================
    // Service & Runtime Errors
    // ======================================
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // ======================================
    // Catch-all for other errors
    // ======================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using RecipeError
pub type RecipeResult<T> = Result<T, RecipeError>;

impl RecipeError {
    /// Get the closest HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::Validation(_) | Self::InvalidParameter { .. } => 400,

            // 404 Not Found
            Self::FileNotFound(_) => 404,

            // 502 Bad Gateway
            Self::Protocol { .. }
            | Self::ConnectionFailed { .. }
            | Self::WebSocket(_)
            | Self::JoinRejected { .. }
            | Self::HttpClient(_) => 502,

            // 503 Service Unavailable
            Self::ChannelClosed(_) => 503,

            // 504 Gateway Timeout
            Self::Timeout(_) => 504,

            // 500 Internal Server Error
            Self::Configuration(_)
            | Self::InvalidConfig { .. }
            | Self::MissingConfig(_)
            | Self::Io(_)
            | Self::Csv(_)
            | Self::Serialization(_)
            | Self::Deserialization(_)
            | Self::Internal(_)
            | Self::Other(_) => 500,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::ConnectionFailed { .. } | Self::WebSocket(_) => true,
            Self::HttpClient(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Convert to ErrorInfo for JSON output
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.to_string())
            .with_code(self.status_code())
            .with_error_code(self.error_code())
            .with_retryable(self.is_retryable())
    }
}

// Conversion traits for common error types
impl From<serde_json::Error> for RecipeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for RecipeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}

impl From<csv::Error> for RecipeError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

impl From<figment::Error> for RecipeError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RecipeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::RecipeError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::RecipeError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::RecipeError::Validation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::RecipeError::Validation(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! protocol_error {
    ($protocol:expr, $msg:expr) => {
        $crate::RecipeError::Protocol {
            protocol: $protocol.to_string(),
            message: $msg.to_string(),
        }
    };
}

// ============================================================================
// RecipeError implements ClassifiedError
// ============================================================================

impl ClassifiedError for RecipeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::MissingConfig(_) => "MISSING_CONFIG",

            Self::Protocol { .. } => "PROTOCOL_ERROR",
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::WebSocket(_) => "WEBSOCKET_ERROR",
            Self::JoinRejected { .. } => "JOIN_REJECTED",

            Self::HttpClient(_) => "HTTP_CLIENT_ERROR",

            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",

            Self::Io(_) => "IO_ERROR",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::Csv(_) => "CSV_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Deserialization(_) => "DESERIALIZATION_ERROR",

            Self::ChannelClosed(_) => "CHANNEL_CLOSED",
            Self::Internal(_) => "INTERNAL_ERROR",

            Self::Other(_) => "OTHER_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } | Self::MissingConfig(_) => {
                ErrorCategory::Configuration
            },

            Self::Protocol { .. } | Self::JoinRejected { .. } => ErrorCategory::Protocol,

            Self::ConnectionFailed { .. } | Self::WebSocket(_) => ErrorCategory::Connection,

            Self::HttpClient(_) => ErrorCategory::Network,

            Self::Timeout(_) => ErrorCategory::Timeout,

            Self::Validation(_) | Self::InvalidParameter { .. } => ErrorCategory::Validation,

            Self::FileNotFound(_) => ErrorCategory::NotFound,

            Self::Io(_)
            | Self::Csv(_)
            | Self::Serialization(_)
            | Self::Deserialization(_) => ErrorCategory::Data,

            Self::ChannelClosed(_) | Self::Internal(_) => ErrorCategory::Internal,

            Self::Other(_) => ErrorCategory::Unknown,
        }
    }
}

// ============================================================================
// Error classification trait
// ============================================================================

/// Error category enum - used for classification and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Infrastructure layer
    Configuration,
    Network,
    Timeout,
    Connection,
    Protocol,

    // Request layer
    Validation,
    NotFound,

    // Local data (files, CSV, JSON)
    Data,

    // System level
    Internal,

    // Others
    Unknown,
}

/// Error capability trait
///
/// Gives every error in the workspace a stable code and a category; the
/// log level follows from the category.
pub trait ClassifiedError: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and JSON output)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Data => Level::ERROR,
            ErrorCategory::Network
            | ErrorCategory::Timeout
            | ErrorCategory::Connection
            | ErrorCategory::Protocol => Level::WARN,
            ErrorCategory::Validation | ErrorCategory::NotFound => Level::INFO,
            _ => Level::WARN,
        }
    }
}

// Tests
#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(RecipeError::Validation("test".into()).status_code(), 400);
        assert_eq!(RecipeError::FileNotFound("a.csv".into()).status_code(), 404);
        assert_eq!(RecipeError::Internal("test".into()).status_code(), 500);
        assert_eq!(RecipeError::WebSocket("test".into()).status_code(), 502);
        assert_eq!(RecipeError::ChannelClosed("test".into()).status_code(), 503);
        assert_eq!(RecipeError::Timeout("test".into()).status_code(), 504);
    }

    #[test]
    fn test_error_retryable() {
        assert!(RecipeError::Timeout("test".into()).is_retryable());
        assert!(RecipeError::WebSocket("reset".into()).is_retryable());
        assert!(!RecipeError::Validation("test".into()).is_retryable());
        assert!(!RecipeError::Csv("bad row".into()).is_retryable());
    }

    #[test]
    fn test_error_info() {
        let error = RecipeError::InvalidConfig {
            field: "api_key".into(),
            reason: "must not be empty".into(),
        };
        let info = error.to_error_info();
        assert_eq!(info.code, 500);
        assert_eq!(info.error_code, "INVALID_CONFIG");
        assert!(info.message.contains("api_key"));
        assert!(!info.retryable);

        let info = RecipeError::Timeout("phx_join".into()).to_error_info();
        assert_eq!(info.code, 504);
        assert!(info.retryable);
    }

    #[test]
    fn test_classification() {
        let err = RecipeError::JoinRejected {
            channel: "recipes-changes".into(),
            reason: "unauthorized".into(),
        };
        assert_eq!(err.error_code(), "JOIN_REJECTED");
        assert_eq!(err.category(), ErrorCategory::Protocol);
        assert_eq!(err.log_level(), tracing::Level::WARN);

        let err = RecipeError::Csv("bad row".into());
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_macros() {
        let err = config_error!("missing {}", "backend_url");
        assert_eq!(err.to_string(), "Configuration error: missing backend_url");

        let err = protocol_error!("phoenix", "unexpected reply");
        assert_eq!(err.error_code(), "PROTOCOL_ERROR");

        let err = validation_error!("empty");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }
}
