//! # pocketmail-pop3
//!
//! POP3 command layer (RFC 1939) for pocketmail.
//!
//! ## Features
//!
//! - **Single-line commands**: one line out, one status line back; `-ERR`
//!   is an error or an absent result depending on the caller's
//!   `error_fatal` flag
//! - **Multi-line bodies**: CAPA, TOP, RETR and listings read to the lone
//!   `.` with byte-stuffing undone
//! - **Authentication**: USER/PASS and APOP
//! - **STLS**: in-place TLS upgrade (RFC 2595)
//! - **Stable numbering**: DELE marks without renumbering; RSET unmarks
//!
//! ## Quick Start
//!
//! ```ignore
//! use pocketmail_net::{ConnectOptions, Security, connect};
//! use pocketmail_pop3::Pop3Client;
//!
//! let conn = connect(&ConnectOptions::new("pop.example.com", 995, Security::Implicit)).await?;
//! let mut client = Pop3Client::new(conn);
//! client.greeting().await?;
//! client.login("user@example.com", "password").await?;
//!
//! let count = client.stat().await?;
//! let headers = client.top(count, 0).await?;
//! client.quit().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
pub mod command;
mod error;
pub mod parser;

pub use client::Pop3Client;
pub use command::Command;
pub use error::{Error, Result};
