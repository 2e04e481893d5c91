//! Errors raised while talking to a submission server.

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an SMTP exchange failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The line connection failed; the session is unusable.
    #[error(transparent)]
    Transport(#[from] pocketmail_net::Error),

    /// The server answered with a code the command does not accept.
    #[error("Server rejected command with {code}: {text}")]
    Rejected {
        /// Reply code, e.g. 550.
        code: u16,
        /// Reply text, lines joined with newlines.
        text: String,
    },

    /// Credentials refused or the SASL exchange broke down.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A reply that does not follow the reply grammar.
    #[error("Malformed reply: {0}")]
    Protocol(String),

    /// An address that cannot be used in MAIL FROM or RCPT TO.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The server did not advertise a required extension.
    #[error("Server does not offer {0}")]
    NotSupported(String),

    /// A SASL challenge that is not valid Base64.
    #[error("Invalid challenge encoding: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl Error {
    /// Builds a rejection from a reply.
    #[must_use]
    pub fn rejected(code: u16, text: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            text: text.into(),
        }
    }

    const fn rejection_class(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } => Some(*code / 100),
            _ => None,
        }
    }

    /// Returns true for a 5xx rejection; retrying the same input will fail again.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self.rejection_class(), Some(5))
    }

    /// Returns true for a 4xx rejection.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.rejection_class(), Some(4))
    }

    /// Returns true if the connection can no longer be used.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classes() {
        assert!(Error::rejected(550, "no such user").is_permanent());
        assert!(Error::rejected(451, "try later").is_transient());
        assert!(!Error::rejected(451, "try later").is_permanent());
        assert!(!Error::Protocol("garbage".into()).is_transient());
    }

    #[test]
    fn test_connection_lost() {
        assert!(Error::Transport(pocketmail_net::Error::Closed).is_connection_lost());
        assert!(!Error::Auth("bad".into()).is_connection_lost());
        assert!(!Error::rejected(421, "closing").is_connection_lost());
    }
}
