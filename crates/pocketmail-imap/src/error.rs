//! Error types for the IMAP library.

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection failed or was lost.
    #[error(transparent)]
    Transport(#[from] pocketmail_net::Error),

    /// Malformed server data.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Well-formed data with the wrong shape, such as a short ENVELOPE.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Creates a parse error.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Returns true for errors raised while interpreting server data.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Malformed(_))
    }

    /// Returns true if the connection can no longer be used.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Bye(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_lost() {
        assert!(Error::Transport(pocketmail_net::Error::Closed).is_connection_lost());
        assert!(Error::Bye("shutting down".into()).is_connection_lost());
        assert!(!Error::No("no such mailbox".into()).is_connection_lost());
        assert!(!Error::parse(3, "unexpected byte").is_connection_lost());
        assert!(!Error::Malformed("short envelope".into()).is_connection_lost());
    }

    #[test]
    fn test_display() {
        let err = Error::parse(12, "unterminated list");
        assert_eq!(err.to_string(), "Parse error at position 12: unterminated list");
        assert_eq!(Error::Bad("syntax".into()).to_string(), "Server returned BAD: syntax");
    }
}
