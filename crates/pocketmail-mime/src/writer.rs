//! Serialization of a part tree to wire-format MIME.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{debug, warn};

use crate::address::format_address_header;
use crate::content_type::ContentType;
use crate::encoding::{encode_base64_wrapped, encode_quoted_printable, encode_rfc2047};
use crate::envelope::Envelope;
use crate::part::{BinaryPart, MessagePart, PartContents, TextPart};
use crate::transfer::TransferEncoding;

/// Longest line allowed in 7bit content (RFC 5322).
const MAX_7BIT_LINE: usize = 998;

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Creates a boundary unique within this process.
///
/// `=_` can never occur in quoted-printable or base64 output, so encoded
/// content cannot collide with it.
fn new_boundary() -> String {
    let n = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("=_pm_{:x}_{n:x}", Utc::now().timestamp_micros())
}

/// Serializes a message: envelope headers followed by the part tree.
#[must_use]
pub fn write_message(envelope: &Envelope, root: &MessagePart, contents: &PartContents) -> Vec<u8> {
    let mut writer = MimeWriter::new(contents);
    writer.write_envelope(envelope);
    writer.write_part(root);
    writer.finish()
}

/// Depth-first writer over a part tree.
pub struct MimeWriter<'a> {
    contents: &'a PartContents,
    out: Vec<u8>,
}

impl<'a> MimeWriter<'a> {
    /// Creates a writer that takes part content from `contents`.
    #[must_use]
    pub const fn new(contents: &'a PartContents) -> Self {
        Self {
            contents,
            out: Vec::new(),
        }
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.out
    }

    fn header(&mut self, name: &str, value: &str) {
        self.out.extend_from_slice(name.as_bytes());
        self.out.extend_from_slice(b": ");
        self.out.extend_from_slice(value.as_bytes());
        self.out.extend_from_slice(b"\r\n");
    }

    fn address_header(&mut self, name: &str, addresses: &[String]) {
        if !addresses.is_empty() {
            self.header(name, &format_address_header(addresses));
        }
    }

    /// Writes the top-level message headers. Bcc is never written.
    pub fn write_envelope(&mut self, envelope: &Envelope) {
        self.header("Date", &envelope.date.to_rfc2822());
        self.address_header("From", &envelope.from);
        if envelope.sender != envelope.from {
            self.address_header("Sender", &envelope.sender);
        }
        self.address_header("Reply-To", &envelope.reply_to);
        self.address_header("To", &envelope.to);
        self.address_header("Cc", &envelope.cc);
        self.header("Subject", &encode_rfc2047(&envelope.subject));
        if let Some(id) = &envelope.message_id {
            self.header("Message-ID", id);
        }
        if let Some(id) = &envelope.in_reply_to {
            self.header("In-Reply-To", id);
        }
        self.header("MIME-Version", "1.0");
    }

    /// Writes one part: its headers, a blank line and its body.
    pub fn write_part(&mut self, part: &MessagePart) {
        match part {
            MessagePart::Multipart(multipart) => {
                let boundary = new_boundary();
                let content_type = ContentType::new("multipart", multipart.kind().subtype())
                    .with_parameter("boundary", boundary.as_str());
                self.header("Content-Type", &content_type.to_string());
                self.out.extend_from_slice(b"\r\n");

                for child in &multipart.children {
                    self.out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                    self.write_part(child);
                    self.out.extend_from_slice(b"\r\n");
                }
                self.out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
            }
            MessagePart::Text(text) => match self.contents.get(&text.id) {
                Some(content) => self.write_text(text, content),
                None => self.write_placeholder(part, "content missing"),
            },
            MessagePart::Image(binary)
            | MessagePart::Application(binary)
            | MessagePart::Audio(binary)
            | MessagePart::Video(binary) => match self.contents.get(&binary.id) {
                Some(content) => self.write_binary(part.media_type(), binary, content),
                None => self.write_placeholder(part, "content missing"),
            },
            MessagePart::Unsupported(_) => self.write_placeholder(part, "unsupported media type"),
        }
    }

    fn write_text(&mut self, text: &TextPart, content: &[u8]) {
        let mut encoding = TransferEncoding::for_charset(&text.charset);
        if encoding == TransferEncoding::SevenBit && !fits_7bit(content) {
            debug!(part = %text.id, "text does not fit 7bit, using quoted-printable");
            encoding = TransferEncoding::QuotedPrintable;
        }

        let mut content_type =
            ContentType::new("text", text.subtype.as_str()).with_parameter("charset", text.charset.as_str());
        if let Some(name) = &text.filename {
            content_type = content_type.with_parameter("name", name.as_str());
        }
        self.header("Content-Type", &content_type.to_string());
        self.header("Content-Transfer-Encoding", &encoding.to_string());
        if let Some(name) = &text.filename {
            self.disposition(name);
        }
        self.out.extend_from_slice(b"\r\n");

        match encoding {
            TransferEncoding::QuotedPrintable => {
                self.out
                    .extend_from_slice(encode_quoted_printable(content).as_bytes());
            }
            TransferEncoding::Base64 => {
                self.out
                    .extend_from_slice(encode_base64_wrapped(content).as_bytes());
            }
            TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
                self.out.extend_from_slice(content);
            }
        }
    }

    fn write_binary(&mut self, media_type: &str, binary: &BinaryPart, content: &[u8]) {
        let mut content_type = ContentType::new(media_type, binary.subtype.as_str());
        if let Some(name) = &binary.filename {
            content_type = content_type.with_parameter("name", name.as_str());
        }
        self.header("Content-Type", &content_type.to_string());
        self.header("Content-Transfer-Encoding", "base64");
        if let Some(name) = &binary.filename {
            self.disposition(name);
        }
        self.out.extend_from_slice(b"\r\n");
        self.out
            .extend_from_slice(encode_base64_wrapped(content).as_bytes());
    }

    fn disposition(&mut self, filename: &str) {
        let escaped = encode_rfc2047(filename).replace('\\', "\\\\").replace('"', "\\\"");
        self.header("Content-Disposition", &format!("attachment; filename=\"{escaped}\""));
    }

    /// Emits a `text/plain` note in place of a part that cannot be encoded.
    fn write_placeholder(&mut self, part: &MessagePart, reason: &str) {
        let media_type = part.media_type();
        let subtype = part.subtype();
        warn!(part = %part.id(), media_type, subtype, reason, "replacing part with placeholder");

        self.header("Content-Type", "text/plain; charset=us-ascii");
        self.header("Content-Transfer-Encoding", "7bit");
        self.out.extend_from_slice(b"\r\n");
        self.out.extend_from_slice(
            format!("[This {media_type}/{subtype} part could not be encoded ({reason}).]\r\n").as_bytes(),
        );
    }
}

/// Returns true if content can be sent as 7bit without alteration.
///
/// Line breaks are kept as they are, bare LF included; the SMTP layer turns
/// them into CRLF on the wire. Only bytes outside US-ASCII, NUL and lines
/// past the 7bit length limit need another encoding.
fn fits_7bit(content: &[u8]) -> bool {
    content
        .split(|&b| b == b'\n' || b == b'\r')
        .all(|line| line.len() <= MAX_7BIT_LINE && line.iter().all(|&b| b != 0 && b.is_ascii()))
}
