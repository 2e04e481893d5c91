//! # pocketmail-mime
//!
//! Message model and MIME converter for pocketmail.
//!
//! ## Features
//!
//! - **Part tree**: [`MessagePart`] is a closed enum over multipart, text,
//!   image, application, audio, video and unsupported parts; content lives
//!   separately in [`PartContents`]
//! - **Envelope**: [`Envelope`] built from RFC 822 headers with RFC 2047
//!   decoding and defensive date parsing
//! - **Writing**: [`write_message`] picks transfer encodings by charset and
//!   media type and never fails on a bad part
//! - **Parsing**: [`parse_message`] rebuilds the tree from raw bytes with a
//!   size cap
//! - **Reply/forward**: [`reply_text`] and [`forward_part`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use pocketmail_mime::{Envelope, OutgoingMessage, parse_message};
//!
//! let envelope = Envelope {
//!     from: vec!["Ann <ann@example.com>".into()],
//!     to: vec!["bob@example.com".into()],
//!     subject: "Hello".into(),
//!     ..Envelope::default()
//! };
//! let wire = OutgoingMessage::text(envelope, "Hi Bob").to_bytes();
//!
//! let parsed = parse_message(&wire, None)?;
//! assert_eq!(parsed.envelope.subject, "Hello");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod compose;
mod content_type;
mod date;
mod envelope;
mod error;
mod header;
mod message;
mod parser;
mod part;
mod transfer;
mod writer;

pub mod encoding;

pub use address::{address_only, format_address, format_address_header, parse_address_list};
pub use compose::{forward_envelope, forward_part, primary_text, reply_envelope, reply_text};
pub use content_type::ContentType;
pub use date::{parse_date, parse_date_or_now};
pub use envelope::{Envelope, PLACEHOLDER_SENDER, PLACEHOLDER_SUBJECT};
pub use error::{Error, Result};
pub use header::{Headers, split_header_block};
pub use message::OutgoingMessage;
pub use parser::{ParsedMessage, parse_envelope, parse_message};
pub use part::{
    BinaryPart, MessagePart, Multipart, MultipartKind, PartContents, PartId, TextPart,
    UnsupportedPart,
};
pub use transfer::TransferEncoding;
pub use writer::{MimeWriter, write_message};
