//! Error types for cycle-autotag
//!
//! Defines the crate-wide error enum covering configuration, transport,
//! response-shape and document-structure failures. Uses thiserror for
//! ergonomic error handling.

use crate::integrations::retry::RetryError;
use crate::integrations::transport::TransportError;
use thiserror::Error;

/// Result type alias for cycle-autotag operations
pub type Result<T> = std::result::Result<T, AutotagError>;

/// Comprehensive error type for cycle-autotag operations
#[derive(Error, Debug)]
pub enum AutotagError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// All attempts of a GraphQL operation failed
    #[error("GraphQL request failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The retry delay was interrupted by shutdown
    #[error("GraphQL request cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// A response field was present but had an unexpected shape
    #[error("Malformed GraphQL response for {operation}: {message}")]
    MalformedResponse {
        operation: &'static str,
        message: String,
    },

    /// A field needed to continue was absent from the response
    #[error("Missing field in response: {0}")]
    MissingField(String),

    /// The document could not be fetched (not found, or not a Doc node)
    #[error("Document unavailable: {0}")]
    DocumentUnavailable(String),

    /// The document has an assignee without an email address
    #[error("Document {0} has an assignee without an email")]
    MissingAssignee(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<RetryError> for AutotagError {
    fn from(err: RetryError) -> Self {
        match err {
            RetryError::Exhausted { attempts, source } => {
                AutotagError::RetryExhausted { attempts, source }
            }
            RetryError::Cancelled { attempts } => AutotagError::Cancelled { attempts },
        }
    }
}

impl AutotagError {
    /// Short, stable name of the error variant (used for logs and metric labels)
    pub fn kind(&self) -> &'static str {
        match self {
            AutotagError::Config(_) => "config",
            AutotagError::RetryExhausted { .. } => "retry_exhausted",
            AutotagError::Cancelled { .. } => "cancelled",
            AutotagError::MalformedResponse { .. } => "malformed_response",
            AutotagError::MissingField(_) => "missing_field",
            AutotagError::DocumentUnavailable(_) => "document_unavailable",
            AutotagError::MissingAssignee(_) => "missing_assignee",
            AutotagError::Io(_) => "io",
            AutotagError::Yaml(_) => "yaml",
            AutotagError::Http(_) => "http",
            AutotagError::Other(_) => "other",
        }
    }
}
