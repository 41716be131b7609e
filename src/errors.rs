/*!
 * Error types for the readalong library.
 *
 * This module contains custom error types for different parts of the library,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::sync::Arc;

use thiserror::Error;

/// Errors raised while building identity keys
///
/// These indicate a programming error in the caller and should never reach
/// the reader UI.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// A key component was malformed or out of range
    #[error("Invalid key input: {0}")]
    InvalidKeyInput(String),
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The provider did not answer in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Map a non-success HTTP status and body to the provider error taxonomy
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError {
                status_code,
                message,
            },
        }
    }

    /// Map a transport level reqwest error
    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors raised by a cache store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// The persistent backend failed
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// A stored row could not be decoded into an artifact
    #[error("Corrupt cache entry for {key}: {reason}")]
    Corrupt {
        /// Key of the offending entry
        key: String,
        /// What was wrong with it
        reason: String,
    },
}

impl From<anyhow::Error> for StoreError {
    fn from(error: anyhow::Error) -> Self {
        Self::Backend(format!("{:#}", error))
    }
}

/// Errors surfaced by the artifact reconciler
///
/// The type is `Clone` so every caller attached to one in-flight request
/// observes the same outcome.
#[derive(Error, Debug, Clone)]
pub enum ReconcileError {
    /// The identity inputs were invalid
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// The external provider failed; retryable by the user
    #[error("Provider error: {0}")]
    Provider(Arc<ProviderError>),

    /// The cache store failed
    #[error("Cache store error: {0}")]
    Store(Arc<StoreError>),

    /// Writing the audio file failed
    #[error("Audio file error: {0}")]
    Io(Arc<std::io::Error>),

    /// The paragraph does not exist in the loaded document
    #[error("Paragraph {0} is not part of the document")]
    UnknownParagraph(usize),

    /// The paragraph was left before the result arrived
    #[error("Request cancelled for paragraph {0}")]
    Cancelled(usize),

    /// The background request task died before producing a result
    #[error("Background request failed: {0}")]
    Internal(String),
}

impl ReconcileError {
    /// Returns true when a later explicit user action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Io(_) | Self::Cancelled(_))
    }
}

impl From<ProviderError> for ReconcileError {
    fn from(error: ProviderError) -> Self {
        Self::Provider(Arc::new(error))
    }
}

impl From<StoreError> for ReconcileError {
    fn from(error: StoreError) -> Self {
        Self::Store(Arc::new(error))
    }
}

impl From<std::io::Error> for ReconcileError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(Arc::new(error))
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the reconciler
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Error from the cache store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
