//! Error types for mock registry operations.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running the mock registry server.
#[derive(Debug, Error)]
pub enum MockServerError {
    /// A lifecycle operation was called in a state that does not allow it.
    #[error("cannot {operation} a server that is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Reserving or binding the listening socket failed.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    /// The accept loop hit a listener error that was not an intentional abort.
    #[error("listener failed: {0}")]
    Listener(#[source] std::io::Error),

    /// Writing a response failed for a reason other than the peer going away.
    #[error("connection failed: {0}")]
    Connection(#[from] hyper::Error),

    /// The accept loop task panicked or was cancelled.
    #[error("accept loop terminated abnormally: {0}")]
    LoopPanicked(String),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("failed to serialize response: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// An external command could not be started.
    #[error("failed to run '{program}': {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external command did not exit in time and was killed.
    #[error("'{program}' timed out after {timeout:?}")]
    CommandTimedOut { program: String, timeout: Duration },
}

/// Result type alias for mock registry operations.
pub type Result<T> = core::result::Result<T, MockServerError>;
