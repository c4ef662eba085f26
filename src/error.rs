//! Error types for the chat client.
//!
//! Besides transport and decoding failures, the enum carries the recovery
//! classes the controller branches on: an expired session, a login
//! interruption, exhausted credits, a server error embedded in the stream,
//! and a client-side abort.

use thiserror::Error;

/// Client error type.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// The backend no longer knows the session (HTTP 404).
    #[error("Session expired")]
    SessionExpired,

    /// The backend requires the user to log in again.
    #[error("Login required: {message}")]
    LoginRequired {
        /// Server-supplied prompt.
        message: String,
    },

    /// The account has no credits left for another reply.
    #[error("Credits exhausted: {message}")]
    CreditsExhausted {
        /// Server-supplied explanation.
        message: String,
    },

    /// An error event arrived inside the response stream.
    #[error("{0}")]
    Server(String),

    /// The request was cut off on the client side (timeout).
    #[error("Request aborted")]
    Aborted,

    /// Exported document was too short to be worth saving.
    #[error("Insufficient content for export ({len} chars)")]
    InsufficientContent {
        /// Character count of the rejected document.
        len: usize,
    },

    /// No message with action controls has this id.
    #[error("No actions available for message #{0}")]
    ActionUnavailable(u64),

    /// The request was rejected before reaching the backend.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Text suitable for showing to the user: the server's own reason when
    /// it sent one.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. }
            | Self::LoginRequired { message }
            | Self::CreditsExhausted { message }
            | Self::Server(message)
            | Self::InvalidInput(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this error is a client-side abort (timeout) rather than a
    /// generic failure.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        match self {
            Self::Aborted => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
