//! Error types for the core library.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the protocol adapters, the handler and the send service.
#[derive(Debug, Error)]
pub enum Error {
    /// Line connection failure outside a protocol session.
    #[error(transparent)]
    Net(#[from] pocketmail_net::Error),

    /// IMAP error.
    #[error("IMAP error: {0}")]
    Imap(#[from] pocketmail_imap::Error),

    /// POP3 error.
    #[error("POP3 error: {0}")]
    Pop3(#[from] pocketmail_pop3::Error),

    /// SMTP error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] pocketmail_smtp::Error),

    /// Message parsing error.
    #[error("MIME error: {0}")]
    Mime(#[from] pocketmail_mime::Error),

    /// The request needs an open connection.
    #[error("Connection is not open")]
    NotOpen,

    /// No such folder.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// The token no longer names the message it was issued for.
    #[error("Stale message token: {0}")]
    StaleToken(String),

    /// The token belongs to a different protocol.
    #[error("Token does not belong to this protocol")]
    WrongProtocol,

    /// The settings cannot be used.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The handler was shut down.
    #[error("Connection handler is shut down")]
    ShutDown,

    /// `restart` was called on a running handler.
    #[error("Connection handler is still running")]
    Running,
}

impl Error {
    /// Classifies the failure.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Net(e) => net_kind(e),
            Self::Imap(e) => match e {
                pocketmail_imap::Error::Transport(e) => net_kind(e),
                pocketmail_imap::Error::Bye(_) => FailureKind::Transport,
                pocketmail_imap::Error::Auth(_) => FailureKind::Auth,
                pocketmail_imap::Error::Parse { .. } | pocketmail_imap::Error::Malformed(_) => {
                    FailureKind::Parse
                }
                _ => FailureKind::Protocol,
            },
            Self::Pop3(e) => match e {
                pocketmail_pop3::Error::Transport(e) => net_kind(e),
                pocketmail_pop3::Error::Auth(_) => FailureKind::Auth,
                _ => FailureKind::Protocol,
            },
            Self::Smtp(e) => match e {
                pocketmail_smtp::Error::Transport(e) => net_kind(e),
                pocketmail_smtp::Error::Auth(_) => FailureKind::Auth,
                pocketmail_smtp::Error::Decode(_) => FailureKind::Parse,
                _ => FailureKind::Protocol,
            },
            Self::Mime(_) => FailureKind::Parse,
            Self::NotOpen => FailureKind::Transport,
            Self::Config(_) => FailureKind::Connect,
            Self::FolderNotFound(_)
            | Self::StaleToken(_)
            | Self::WrongProtocol
            | Self::ShutDown
            | Self::Running => FailureKind::Protocol,
        }
    }

    /// Returns true if the connection must be dropped and reopened.
    #[must_use]
    pub fn is_connection_level(&self) -> bool {
        self.kind().is_connection_level()
    }
}

fn net_kind(error: &pocketmail_net::Error) -> FailureKind {
    if error.is_connect_failure() {
        FailureKind::Connect
    } else {
        FailureKind::Transport
    }
}

/// Coarse failure class reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The socket or TLS session could not be set up.
    Connect,
    /// I/O failed or the server went away mid-session.
    Transport,
    /// The server answered a command with an error status.
    Protocol,
    /// Credentials were rejected.
    Auth,
    /// Server data did not match the expected grammar.
    Parse,
}

impl FailureKind {
    /// Connect and transport failures leave no usable connection.
    #[must_use]
    pub const fn is_connection_level(self) -> bool {
        matches!(self, Self::Connect | Self::Transport)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
