//! # pocketmail-core
//!
//! Account-level mail engine for pocketmail.
//!
//! This crate provides:
//! - Account settings and engine limits
//! - IMAP and POP3 adapters behind one [`MailProtocol`] surface
//! - A [`ConnectionHandler`] per account: one worker task, a FIFO request
//!   queue, and outcomes published as [`MailEvent`]s
//! - The folder tree, message tokens and the server capability table
//! - Batch sending over SMTP
//!
//! ## Quick Start
//!
//! ```ignore
//! use pocketmail_core::{
//!     AccountConfig, ConnectionHandler, Credentials, DialerFactory, Limits, MessageRange,
//!     QueueDispatcher, TcpDialer,
//! };
//!
//! let account = AccountConfig::imap("imap.example.com", Credentials::new("ann", "secret"));
//! let (dispatcher, mut events) = QueueDispatcher::channel();
//! let handler = ConnectionHandler::spawn(
//!     account,
//!     Limits::default(),
//!     DialerFactory::new(TcpDialer),
//!     dispatcher,
//! );
//! handler.add_listener(listener);
//!
//! handler.open()?;
//! handler.fetch_messages("INBOX", MessageRange::Newest)?;
//!
//! // On the UI loop:
//! events.run_pending();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod capability;
pub mod config;
mod error;
pub mod event;
pub mod folder;
pub mod handler;
pub mod message;
pub mod protocol;
pub mod send;

pub use capability::Capabilities;
pub use config::{AccountConfig, Credentials, Limits, ProtocolKind, SmtpConfig, ValidationError};
pub use error::{Error, FailureKind, Result};
pub use event::{
    Delivery, EventDispatcher, EventQueue, MailEvent, MailListener, QueueDispatcher, RequestKind,
};
pub use folder::{FolderItem, FolderStatus, INBOX};
pub use handler::{ActiveFolder, ConnectionHandler, ConnectionState, Request};
pub use message::{FetchedMessage, FolderMessage, MessageFlags, MessageRange, MessageToken};
pub use protocol::{
    AnyProtocol, Dialer, DialerFactory, FolderUpdate, ImapProtocol, MailProtocol, Pop3Protocol,
    ProtocolFactory, TcpDialer,
};
pub use send::{send_messages, send_messages_over};

pub use pocketmail_mime::{Envelope, OutgoingMessage};
pub use pocketmail_net::Security;
pub use pocketmail_smtp::AuthMechanism;
