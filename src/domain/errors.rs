//! Domain error types
//!
//! This module defines the error hierarchy for Catalog Sync.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Catalog Sync error type
///
/// This is the primary error type used throughout the application.
/// The variants follow the failure taxonomy of a sync run: configuration
/// problems are terminal, transport and storage problems are transient,
/// mapping problems are isolated to a single record.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors (missing, inactive or ambiguous endpoint, bad TOML)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Outbound call to the external system failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// An external record could not be mapped to an internal entity
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// A referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(String),

    /// A row changed between read and write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another worker holds the lease for the same operation and parameters
    #[error("Lease held: {0}")]
    LeaseHeld(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Whether the outer retry policy should schedule another attempt
    ///
    /// Configuration and validation problems will fail the same way on every
    /// attempt, so they are terminal.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SyncError::Configuration(_) | SyncError::Validation(_) | SyncError::Mapping(_)
        )
    }

    /// Whether this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, SyncError::Configuration(_))
    }
}

/// Transport failures against the external system
///
/// These errors don't expose the HTTP client's own error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, TLS failure, reset...
    #[error("network failure: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The fixed request timeout elapsed
    #[error("request timed out: {0}")]
    Timeout(String),

    /// 2xx response whose body is not the expected JSON
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// HTTP status code, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::Configuration(format!("TOML parse error: {err}"))
    }
}
