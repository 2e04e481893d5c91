//! # pocketmail-smtp
//!
//! SMTP command layer (RFC 5321) for pocketmail.
//!
//! ## Features
//!
//! - **Type-state sessions**: authentication is only offered on a
//!   [`Connected`] session and yields an [`Authenticated`] one
//! - **EHLO capability table** with HELO fallback
//! - **STARTTLS**: TLS is in place before the next command, then EHLO is
//!   repeated
//! - **Authentication**: PLAIN, LOGIN, CRAM-MD5
//! - **Transactions**: MAIL FROM / RCPT TO with display names stripped,
//!   DATA with dot-stuffing, RSET between messages on a reused connection
//!
//! ## Quick Start
//!
//! ```ignore
//! use pocketmail_net::{ConnectOptions, Security, connect};
//! use pocketmail_smtp::{AuthMechanism, SmtpClient};
//!
//! let conn = connect(&ConnectOptions::new("smtp.example.com", 587, Security::StartTls)).await?;
//! let client = SmtpClient::greeting(conn).await?;
//! let client = client.ehlo("client.example.com").await?;
//! let client = client.starttls("smtp.example.com").await?;
//! let mut client = client
//!     .authenticate(AuthMechanism::Plain, "user@example.com", "password")
//!     .await?;
//!
//! client
//!     .send("Ann <user@example.com>", &["bob@example.org"], b"Subject: Hi\r\n\r\nHello\r\n")
//!     .await?;
//! client.quit().await?;
//! ```
//!
//! ## Connection States
//!
//! ```text
//! greeting() ──→ Connected ── ehlo()/starttls() ──→ Connected
//!                    │
//!                    └── authenticate() ──→ Authenticated
//!
//! mail_from / rcpt_to / data / send / rset / noop / quit: both states
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod sasl;
pub mod types;

pub use connection::{Authenticated, Connected, ServerInfo, SessionState, SmtpClient};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Reply, ReplyCode};
