//! Error types for POP3 operations.

use thiserror::Error;

/// Errors that can occur during POP3 operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Line connection failure (I/O, TLS, unexpected close).
    #[error(transparent)]
    Transport(#[from] pocketmail_net::Error),

    /// Server answered `-ERR`.
    #[error("Server error: {0}")]
    Server(String),

    /// USER/PASS or APOP was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Reply did not have the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation not valid in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Returns true if the connection can no longer be used.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
