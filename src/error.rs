//! Error types for the synchronizer
//!
//! One enum covers every failure mode. Transport failures keep the HTTP
//! status so callers can tell a timeout (408) or an auth problem apart from
//! a malformed payload.

use thiserror::Error;

/// Result type alias for synchronizer operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Comprehensive error type for synchronizer operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration errors (missing credentials, bad URLs, invalid documents)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-2xx response or request timeout
    #[error("HTTP {status}: {message}")]
    Transport { status: u16, message: String },

    /// A payload could not be turned into the canonical model
    #[error("Parse error: {0}")]
    Parse(String),

    /// Adapter-level failures (source or target)
    #[error("Integration error: {0}")]
    Integration(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors that never produced a response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Google credential errors (key file or token exchange)
    #[error("Authentication error: {0}")]
    Auth(#[from] gcp_auth::Error),

    /// Mapping configuration errors
    #[error("Mapping error: {0}")]
    Mapping(#[from] fieldmap::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Timeout surfaced by the transport layer
    pub fn timeout() -> Self {
        SyncError::Transport {
            status: 408,
            message: "Request timed out".to_string(),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Transport { status, .. } => Some(*status),
            SyncError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
