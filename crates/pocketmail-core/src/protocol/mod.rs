//! Protocol adapters.
//!
//! [`MailProtocol`] is the surface the connection handler drives. The IMAP
//! and POP3 adapters translate its operations into command-layer calls;
//! [`AnyProtocol`] picks one of them from the account settings.

mod imap;
mod pop3;

use std::future::Future;
use std::time::Duration;

use pocketmail_net::{LineConnection, MailStream, TlsUpgrade, connect};

pub use self::imap::ImapProtocol;
pub use self::pop3::Pop3Protocol;
use crate::Result;
use crate::capability::Capabilities;
use crate::config::{AccountConfig, Limits, ProtocolKind};
use crate::folder::{FolderItem, FolderStatus};
use crate::message::{FetchedMessage, FolderMessage, MessageRange, MessageToken};

/// A changed message count noticed during IDLE or NOOP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderUpdate {
    /// Folder path.
    pub folder: String,
    /// New message count.
    pub messages: u32,
}

/// Operations on one account's mail store.
///
/// Implementations own their connection. Every operation except
/// [`open`](Self::open), [`close`](Self::close) and
/// [`force_close`](Self::force_close) requires an open connection and
/// fails with [`Error::NotOpen`](crate::Error::NotOpen) otherwise.
pub trait MailProtocol: Send + 'static {
    /// Connects, upgrades to TLS if configured, and logs in. A no-op when
    /// already open.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Logs out and drops the connection. A no-op when closed.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Drops the connection without a goodbye.
    fn force_close(&mut self);

    /// Returns true while a connection is held.
    fn is_open(&self) -> bool;

    /// Builds the folder tree.
    fn folder_tree(&mut self) -> impl Future<Output = Result<FolderItem>> + Send;

    /// Reads a folder's counters.
    fn folder_status(&mut self, path: &str) -> impl Future<Output = Result<FolderStatus>> + Send;

    /// Lists envelopes and flags for a range of a folder.
    fn fetch_messages(
        &mut self,
        folder: &str,
        range: MessageRange,
    ) -> impl Future<Output = Result<Vec<FolderMessage>>> + Send;

    /// Downloads one message's structure and content.
    fn fetch_message(
        &mut self,
        folder: &str,
        token: &MessageToken,
    ) -> impl Future<Output = Result<FetchedMessage>> + Send;

    /// Marks a message deleted.
    fn delete(
        &mut self,
        folder: &str,
        token: &MessageToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Clears a message's deleted mark. Other messages keep theirs.
    fn undelete(
        &mut self,
        folder: &str,
        token: &MessageToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Starts waiting for server pushes. Returns false, doing nothing, if
    /// the server cannot push.
    fn idle_begin(&mut self) -> impl Future<Output = Result<bool>> + Send;

    /// Waits up to `wait` for a pushed change.
    fn idle_poll(
        &mut self,
        wait: Duration,
    ) -> impl Future<Output = Result<Option<FolderUpdate>>> + Send;

    /// Stops waiting for pushes.
    fn idle_end(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Keepalive; reports a changed message count if the server sent one.
    fn noop(&mut self) -> impl Future<Output = Result<Option<FolderUpdate>>> + Send;

    /// Features advertised on the current connection.
    fn capabilities(&self) -> &Capabilities;
}

/// Opens line connections for the adapters.
pub trait Dialer: Send + Sync + 'static {
    /// Stream type of the connections.
    type Stream: TlsUpgrade + 'static;

    /// Opens a connection to the account's server. Implicit TLS is set up
    /// here; STARTTLS is left to the adapter.
    fn dial(
        &self,
        account: &AccountConfig,
        timeout: Duration,
    ) -> impl Future<Output = pocketmail_net::Result<LineConnection<Self::Stream>>> + Send;
}

/// Dials real TCP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Stream = MailStream;

    async fn dial(
        &self,
        account: &AccountConfig,
        timeout: Duration,
    ) -> pocketmail_net::Result<LineConnection<MailStream>> {
        connect(&account.connect_options(timeout)).await
    }
}

/// Builds protocol adapters from settings.
pub trait ProtocolFactory: Send + Sync + 'static {
    /// Adapter type.
    type Protocol: MailProtocol;

    /// Creates a closed adapter for the account.
    fn build(&self, account: &AccountConfig, limits: &Limits) -> Self::Protocol;
}

/// Factory choosing IMAP or POP3 from [`AccountConfig::protocol`].
#[derive(Debug, Clone, Default)]
pub struct DialerFactory<D> {
    dialer: D,
}

impl<D> DialerFactory<D> {
    /// Creates a factory whose adapters dial through `dialer`.
    pub const fn new(dialer: D) -> Self {
        Self { dialer }
    }
}

impl<D: Dialer + Clone> ProtocolFactory for DialerFactory<D> {
    type Protocol = AnyProtocol<D>;

    fn build(&self, account: &AccountConfig, limits: &Limits) -> AnyProtocol<D> {
        match account.protocol {
            ProtocolKind::Imap => AnyProtocol::Imap(ImapProtocol::new(
                self.dialer.clone(),
                account.clone(),
                *limits,
            )),
            ProtocolKind::Pop3 => AnyProtocol::Pop3(Pop3Protocol::new(
                self.dialer.clone(),
                account.clone(),
                *limits,
            )),
        }
    }
}

/// Either adapter.
#[derive(Debug)]
pub enum AnyProtocol<D: Dialer> {
    /// IMAP adapter.
    Imap(ImapProtocol<D>),
    /// POP3 adapter.
    Pop3(Pop3Protocol<D>),
}

impl<D: Dialer> MailProtocol for AnyProtocol<D> {
    async fn open(&mut self) -> Result<()> {
        match self {
            Self::Imap(p) => p.open().await,
            Self::Pop3(p) => p.open().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Imap(p) => p.close().await,
            Self::Pop3(p) => p.close().await,
        }
    }

    fn force_close(&mut self) {
        match self {
            Self::Imap(p) => p.force_close(),
            Self::Pop3(p) => p.force_close(),
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Self::Imap(p) => p.is_open(),
            Self::Pop3(p) => p.is_open(),
        }
    }

    async fn folder_tree(&mut self) -> Result<FolderItem> {
        match self {
            Self::Imap(p) => p.folder_tree().await,
            Self::Pop3(p) => p.folder_tree().await,
        }
    }

    async fn folder_status(&mut self, path: &str) -> Result<FolderStatus> {
        match self {
            Self::Imap(p) => p.folder_status(path).await,
            Self::Pop3(p) => p.folder_status(path).await,
        }
    }

    async fn fetch_messages(
        &mut self,
        folder: &str,
        range: MessageRange,
    ) -> Result<Vec<FolderMessage>> {
        match self {
            Self::Imap(p) => p.fetch_messages(folder, range).await,
            Self::Pop3(p) => p.fetch_messages(folder, range).await,
        }
    }

    async fn fetch_message(&mut self, folder: &str, token: &MessageToken) -> Result<FetchedMessage> {
        match self {
            Self::Imap(p) => p.fetch_message(folder, token).await,
            Self::Pop3(p) => p.fetch_message(folder, token).await,
        }
    }

    async fn delete(&mut self, folder: &str, token: &MessageToken) -> Result<()> {
        match self {
            Self::Imap(p) => p.delete(folder, token).await,
            Self::Pop3(p) => p.delete(folder, token).await,
        }
    }

    async fn undelete(&mut self, folder: &str, token: &MessageToken) -> Result<()> {
        match self {
            Self::Imap(p) => p.undelete(folder, token).await,
            Self::Pop3(p) => p.undelete(folder, token).await,
        }
    }

    async fn idle_begin(&mut self) -> Result<bool> {
        match self {
            Self::Imap(p) => p.idle_begin().await,
            Self::Pop3(p) => p.idle_begin().await,
        }
    }

    async fn idle_poll(&mut self, wait: Duration) -> Result<Option<FolderUpdate>> {
        match self {
            Self::Imap(p) => p.idle_poll(wait).await,
            Self::Pop3(p) => p.idle_poll(wait).await,
        }
    }

    async fn idle_end(&mut self) -> Result<()> {
        match self {
            Self::Imap(p) => p.idle_end().await,
            Self::Pop3(p) => p.idle_end().await,
        }
    }

    async fn noop(&mut self) -> Result<Option<FolderUpdate>> {
        match self {
            Self::Imap(p) => p.noop().await,
            Self::Pop3(p) => p.noop().await,
        }
    }

    fn capabilities(&self) -> &Capabilities {
        match self {
            Self::Imap(p) => p.capabilities(),
            Self::Pop3(p) => p.capabilities(),
        }
    }
}
