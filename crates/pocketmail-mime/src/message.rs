//! Outgoing messages.

use crate::address::address_only;
use crate::encoding::encode_charset;
use crate::envelope::Envelope;
use crate::part::{MessagePart, PartContents, PartId, TextPart};
use crate::writer::write_message;

/// A message ready to be serialized and handed to SMTP.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Top-level headers.
    pub envelope: Envelope,
    /// Part tree.
    pub body: MessagePart,
    /// Content of the leaves of `body`.
    pub contents: PartContents,
}

impl OutgoingMessage {
    /// Creates a message from an envelope and a part tree.
    #[must_use]
    pub const fn new(envelope: Envelope, body: MessagePart, contents: PartContents) -> Self {
        Self {
            envelope,
            body,
            contents,
        }
    }

    /// Creates a single `text/plain` message.
    ///
    /// ASCII text is sent as US-ASCII, anything else as UTF-8.
    #[must_use]
    pub fn text(envelope: Envelope, text: &str) -> Self {
        let charset = if text.is_ascii() { "us-ascii" } else { "utf-8" };
        let id = PartId::root().child(1);
        let mut contents = PartContents::new();
        contents.insert(id.clone(), encode_charset(text, charset));

        Self {
            envelope,
            body: MessagePart::Text(TextPart::new(id, "plain", charset)),
            contents,
        }
    }

    /// Bare address of the first author, used as the SMTP reverse path.
    #[must_use]
    pub fn sender(&self) -> &str {
        address_only(self.envelope.first_from())
    }

    /// Bare addresses of every To, Cc and Bcc recipient.
    #[must_use]
    pub fn recipients(&self) -> Vec<&str> {
        self.envelope
            .to
            .iter()
            .chain(&self.envelope.cc)
            .chain(&self.envelope.bcc)
            .map(|addr| address_only(addr))
            .collect()
    }

    /// Serializes the message to wire format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        write_message(&self.envelope, &self.body, &self.contents)
    }
}
