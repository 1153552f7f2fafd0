//! Error handling for the token lifecycle engine

use std::sync::Arc;
use thiserror::Error;

/// Unified error type for login, refresh and logout operations.
///
/// The type is `Clone` so that every caller joined on a single in-flight
/// refresh can receive the same rejection; transport causes are wrapped in
/// `Arc` to keep the underlying diagnostic without giving up `Clone`.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// The server answered with a non-success status
    #[error("auth request failed with status {status}: {body}")]
    Server {
        /// HTTP status code returned by the server
        status: u16,
        /// Raw response body, kept for diagnostics
        body: String,
    },

    /// The transport layer failed before a response was received
    #[error("network error during {operation}")]
    Transport {
        /// Which operation was being performed
        operation: &'static str,
        /// The underlying transport error
        #[source]
        cause: Arc<reqwest::Error>,
    },

    /// The request was aborted by the configured timeout
    #[error("{operation} request timed out")]
    Timeout {
        /// Which operation was being performed
        operation: &'static str,
    },

    /// A login/refresh response could not be normalized into a token bundle
    #[error("token field detection failed: {0}")]
    Detection(String),

    /// A token bundle failed validation before persistence
    #[error("invalid token bundle: {0}")]
    InvalidBundle(String),

    /// Invalid configuration, raised at construction time
    #[error("configuration error: {0}")]
    Config(String),

    /// A user-supplied hook or parser failed
    #[error("hook error: {0}")]
    Hook(String),
}

impl AuthError {
    /// Wrap a transport failure, distinguishing timeouts from other
    /// network errors
    pub(crate) fn transport(operation: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Timeout { operation }
        } else {
            AuthError::Transport {
                operation,
                cause: Arc::new(err),
            }
        }
    }

    /// The HTTP status attached to this error, if the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
