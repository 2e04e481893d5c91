//! # pocketmail-imap
//!
//! IMAP command layer for pocketmail: the subset of IMAP4rev1 a mobile
//! client needs to browse folders and read messages.
//!
//! ## Features
//!
//! - **Tagged commands**: [`ImapClient`] numbers commands `A0`, `A1`, ...
//!   and reads every response up to the matching tag, literals included
//! - **Commands**: LOGIN, CAPABILITY, LIST, STATUS, SELECT, FETCH
//!   (ENVELOPE, BODYSTRUCTURE, BODY\[section\], FLAGS), STORE, EXPUNGE,
//!   CLOSE, NOOP, IDLE, STARTTLS, LOGOUT
//! - **Parsers**: a recursive-descent [`parser::Value`] parser, a strict
//!   FETCH grammar, and mapping of ENVELOPE and BODYSTRUCTURE onto the
//!   `pocketmail-mime` model
//!
//! ## Quick Start
//!
//! ```ignore
//! use pocketmail_imap::{FetchAttribute, ImapClient};
//! use pocketmail_net::{ConnectOptions, Security, connect};
//!
//! let options = ConnectOptions::new("imap.example.com", 993, Security::Implicit);
//! let mut client = ImapClient::new(connect(&options).await?);
//! client.greeting().await?;
//! client.login("user@example.com", "password").await?;
//!
//! for entry in client.list("", "%").await? {
//!     println!("{} (selectable: {})", entry.name, entry.can_select);
//! }
//!
//! let status = client.select("INBOX").await?;
//! let range = format!("1:{}", status.exists);
//! for message in client.fetch(&range, &[FetchAttribute::Envelope]).await? {
//!     println!("{}", message.envelope_or_placeholder().subject);
//! }
//!
//! client.logout().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
pub mod command;
mod error;
pub mod parser;
pub mod types;

pub use client::{ImapClient, TaggedResponse};
pub use command::{Command, FetchAttribute, TagGenerator};
pub use error::{Error, Result};
pub use parser::{FetchResponse, decode_section, part_from_body_structure};
pub use types::{
    Flag, Flags, FolderStatus, ListEntry, MailboxEvent, MailboxStatus, StoreAction,
};
