//! # pocketmail-net
//!
//! The line connection used by every pocketmail protocol layer.
//!
//! IMAP, POP3 and SMTP are all line-oriented: a client writes one command
//! line and reads reply lines until the protocol's completion rule is met.
//! This crate provides:
//!
//! - [`MailStream`]: plaintext or TLS TCP stream (rustls, no OpenSSL)
//! - [`LineConnection`]: buffered line reader/writer with byte counters
//!   for progress reporting and an in-place STARTTLS upgrade
//! - [`ConnectOptions`] and [`Security`]: where and how to connect
//!
//! ## Example
//!
//! ```ignore
//! use pocketmail_net::{ConnectOptions, Security, connect};
//!
//! let options = ConnectOptions::new("imap.example.com", 993, Security::Implicit);
//! let mut conn = connect(&options).await?;
//! let greeting = conn.receive().await?;
//! conn.send("A0 CAPABILITY").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod line;
mod stream;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{ConnectOptions, Security};
pub use error::{Error, Result};
pub use line::{LineConnection, MAX_LINE_LENGTH};
pub use stream::{MailStream, TlsUpgrade, connect, create_tls_connector};
