//! Error types for backend access and input validation.

/// Errors surfaced by the dashboard state layer
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (connection refused, TLS, body read).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No response within the client-side request timeout.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body was not the JSON we expected.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// User input rejected before any request was made.
    #[error("invalid input: {0}")]
    Validation(String),

    /// No session token available for an authenticated call.
    #[error("not signed in")]
    NotSignedIn,

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Session record could not be read or written.
    #[error("session storage unavailable: {0}")]
    Storage(String),
}

impl Error {
    /// Network-class failures: worth a non-fatal message and a fallback
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout { .. } | Error::Status { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
