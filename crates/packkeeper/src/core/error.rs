//! Error types for pack maintenance with context and recovery information

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading packs or talking to the remote services
#[derive(Error, Debug)]
pub enum PackError {
    /// Transport-level HTTP failure
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("HTTP request to '{url}' returned status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Network timeout
    #[error("Request to '{url}' timed out (try increasing the timeout or check network)")]
    NetworkTimeout { url: String },

    /// The service answered with nothing usable
    #[error("Empty response from '{url}'")]
    EmptyResponse { url: String },

    /// Response body could not be decoded
    #[error("Unexpected response body from '{url}'")]
    InvalidResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// File system I/O errors with file context
    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Index or catalog list is not valid JSON for its schema
    #[error("Invalid JSON in '{path}'")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// URL parsing errors
    #[error("Invalid URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Retry exhaustion with context
    #[error("Maximum retry attempts ({max_retries}) exceeded for '{url}': {last_error}")]
    MaxRetriesExceeded {
        url: String,
        max_retries: usize,
        last_error: String,
    },

    /// Configuration errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
        suggestion: Option<String>,
    },
}

/// Types of file operations for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Move,
    Copy,
    ListDir,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::Copy => write!(f, "copying"),
            FileOperation::ListDir => write!(f, "listing directory"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, PackError>;

impl PackError {
    /// Wrap an io error with the path and operation it happened on
    pub fn fs(path: impl Into<PathBuf>, operation: FileOperation, source: std::io::Error) -> Self {
        PackError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Classify a reqwest error raised for `url`
    pub fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            PackError::NetworkTimeout {
                url: url.to_string(),
            }
        } else {
            PackError::HttpRequest {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Check if error is recoverable (should retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Only retry on network-related HTTP errors, not client errors (4xx)
            PackError::HttpRequest { source, .. } => source
                .status()
                .map_or(true, |status| status.is_server_error() || status.as_u16() == 429),
            PackError::HttpStatus { status, .. } => {
                status.is_server_error() || status.as_u16() == 429
            }
            PackError::NetworkTimeout { .. } => true,
            PackError::FileSystem { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            PackError::EmptyResponse { .. }
            | PackError::InvalidResponse { .. }
            | PackError::InvalidJson { .. }
            | PackError::InvalidUrl { .. }
            | PackError::MaxRetriesExceeded { .. }
            | PackError::Configuration { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            PackError::HttpRequest { .. } => "http_request",
            PackError::HttpStatus { .. } => "http_status",
            PackError::NetworkTimeout { .. } => "network_timeout",
            PackError::EmptyResponse { .. } => "empty_response",
            PackError::InvalidResponse { .. } => "invalid_response",
            PackError::FileSystem { .. } => "file_system",
            PackError::InvalidJson { .. } => "invalid_json",
            PackError::InvalidUrl { .. } => "invalid_url",
            PackError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
            PackError::Configuration { .. } => "configuration",
        }
    }

    /// Structural errors abort the whole operation; everything else is local to one item
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PackError::InvalidJson { .. } | PackError::Configuration { .. }
        ) || matches!(
            self,
            PackError::FileSystem {
                operation: FileOperation::Read,
                ..
            }
        )
    }

    /// Get user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            PackError::NetworkTimeout { .. } => {
                Some("Check your internet connection or try increasing the timeout value")
            }
            PackError::HttpStatus { status, .. } if status.as_u16() == 403 => {
                Some("Check that the API key is valid")
            }
            PackError::Configuration { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }
}
