//! Error types for the sensorview client
//!
//! This module provides the crate-wide error enum with conversions for the
//! transport and serialization layers, plus the retry classifier used at the
//! fetch boundary: retryable failures surface as a view-scoped message and
//! are retried on the next poll tick instead of stopping the loop.

use thiserror::Error;

/// Result type alias for sensorview operations
pub type Result<T> = std::result::Result<T, SensorViewError>;

/// Error types for dashboard client operations
#[derive(Error, Debug)]
pub enum SensorViewError {
    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend replied with a non-success status
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not found errors (nodes, sensor keys)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Parsing errors (timestamps, range selectors)
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Chart or document rendering errors
    #[error("Render error: {0}")]
    Render(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl SensorViewError {
    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a parsing error
    pub fn parsing<S: Into<String>>(msg: S) -> Self {
        Self::Parsing(msg.into())
    }

    /// Create a render error
    pub fn render<S: Into<String>>(msg: S) -> Self {
        Self::Render(msg.into())
    }

    /// Create an API error from a response status and backend detail message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Generic(anyhow::anyhow!(msg.into()))
    }

    /// Check if error is transient and worth retrying on the next poll tick
    pub fn is_retryable(&self) -> bool {
        match self {
            SensorViewError::Connection(_)
            | SensorViewError::Http(_)
            | SensorViewError::Timeout(_) => true,
            SensorViewError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if error means the requested resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, SensorViewError::NotFound(_))
            || matches!(self, SensorViewError::Api { status: 404, .. })
    }
}

impl From<toml::de::Error> for SensorViewError {
    fn from(err: toml::de::Error) -> Self {
        SensorViewError::Config(format!("TOML parse error: {err}"))
    }
}

impl From<toml::ser::Error> for SensorViewError {
    fn from(err: toml::ser::Error) -> Self {
        SensorViewError::Config(format!("TOML serialize error: {err}"))
    }
}
