//! Error types for the line connection.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while connecting or exchanging lines.
#[derive(Debug, Error)]
pub enum Error {
    /// The socket or TLS session could not be established.
    #[error("Connection to {host}:{port} failed: {reason}")]
    Connect {
        /// Server hostname.
        host: String,
        /// Server port.
        port: u16,
        /// What went wrong.
        reason: String,
    },

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection.
    #[error("Connection closed by server")]
    Closed,

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// A line exceeded the maximum accepted length.
    #[error("Line too long: more than {0} bytes")]
    LineTooLong(usize),

    /// STARTTLS was attempted while unread plaintext was buffered.
    #[error("Cannot start TLS: {0} unread bytes already buffered")]
    BufferedResidue(usize),

    /// Connect timed out.
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates a connect failure.
    #[must_use]
    pub fn connect(host: &str, port: u16, reason: impl Into<String>) -> Self {
        Self::Connect {
            host: host.to_string(),
            port,
            reason: reason.into(),
        }
    }

    /// Returns true if the connection could not be set up at all.
    #[must_use]
    pub const fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Timeout(_) | Self::InvalidDnsName(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
