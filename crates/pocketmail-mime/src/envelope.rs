//! Envelope: the header summary of a message.

use chrono::{DateTime, Utc};

use crate::address::parse_address_list;
use crate::date::parse_date_or_now;
use crate::encoding::decode_rfc2047;
use crate::header::Headers;

/// Subject given to messages whose envelope could not be parsed.
pub const PLACEHOLDER_SUBJECT: &str = "(unparsable message)";

/// Sender given to messages whose envelope could not be parsed.
pub const PLACEHOLDER_SENDER: &str = "unknown";

/// Structured header summary of a message, independent of its body.
///
/// Address fields hold `Name <mailbox@host>` or `mailbox@host` strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Date the message was written.
    pub date: DateTime<Utc>,
    /// Decoded subject.
    pub subject: String,
    /// Authors.
    pub from: Vec<String>,
    /// Actual sender, when different from the author.
    pub sender: Vec<String>,
    /// Where replies should go.
    pub reply_to: Vec<String>,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Blind carbon-copy recipients.
    pub bcc: Vec<String>,
    /// Message-ID of the message this one replies to.
    pub in_reply_to: Option<String>,
    /// This message's Message-ID.
    pub message_id: Option<String>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            date: Utc::now(),
            subject: String::new(),
            from: Vec::new(),
            sender: Vec::new(),
            reply_to: Vec::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            in_reply_to: None,
            message_id: None,
        }
    }
}

impl Envelope {
    /// The envelope used in place of one that could not be parsed.
    ///
    /// Keeps a folder listing going when a single message is malformed.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            subject: PLACEHOLDER_SUBJECT.to_string(),
            from: vec![PLACEHOLDER_SENDER.to_string()],
            ..Self::default()
        }
    }

    /// Returns true if this is a [`Envelope::placeholder`].
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.subject == PLACEHOLDER_SUBJECT && self.from == [PLACEHOLDER_SENDER]
    }

    /// Builds an envelope from parsed RFC 822 headers.
    ///
    /// Never fails: missing headers stay empty and an unparsable date
    /// becomes the current time.
    #[must_use]
    pub fn from_headers(headers: &Headers) -> Self {
        let addresses = |name: &str| -> Vec<String> {
            headers
                .get_all(name)
                .into_iter()
                .flat_map(parse_address_list)
                .collect()
        };
        let id = |name: &str| headers.get(name).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);

        Self {
            date: headers.get("date").map_or_else(Utc::now, parse_date_or_now),
            subject: headers.get("subject").map(decode_rfc2047).unwrap_or_default(),
            from: addresses("from"),
            sender: addresses("sender"),
            reply_to: addresses("reply-to"),
            to: addresses("to"),
            cc: addresses("cc"),
            bcc: addresses("bcc"),
            in_reply_to: id("in-reply-to"),
            message_id: id("message-id"),
        }
    }

    /// First author, or the empty string.
    #[must_use]
    pub fn first_from(&self) -> &str {
        self.from.first().map_or("", String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_placeholder() {
        let envelope = Envelope::placeholder();
        assert_eq!(envelope.subject, "(unparsable message)");
        assert_eq!(envelope.from, vec!["unknown"]);
        assert!(envelope.is_placeholder());
        assert!(!Envelope::default().is_placeholder());
    }

    #[test]
    fn test_from_headers() {
        let headers = Headers::parse(concat!(
            "From: =?utf-8?Q?Zo=C3=AB?= <zoe@example.com>\r\n",
            "To: a@example.com, \"B, C\" <bc@example.com>\r\n",
            "Cc: d@example.com\r\n",
            "Subject: =?iso-8859-1?Q?R=E9union?= today\r\n",
            "Date: Wed, 2 Oct 2002 13:00:00 +0000\r\n",
            "Message-ID: <1@example.com>\r\n",
            "In-Reply-To: <0@example.com>\r\n",
        ));

        let envelope = Envelope::from_headers(&headers);
        assert_eq!(envelope.from, vec!["Zoë <zoe@example.com>"]);
        assert_eq!(envelope.to, vec!["a@example.com", "B, C <bc@example.com>"]);
        assert_eq!(envelope.cc, vec!["d@example.com"]);
        assert!(envelope.bcc.is_empty());
        assert_eq!(envelope.subject, "Réunion today");
        assert_eq!(envelope.date, Utc.with_ymd_and_hms(2002, 10, 2, 13, 0, 0).unwrap());
        assert_eq!(envelope.message_id.as_deref(), Some("<1@example.com>"));
        assert_eq!(envelope.in_reply_to.as_deref(), Some("<0@example.com>"));
        assert_eq!(envelope.first_from(), "Zoë <zoe@example.com>");
    }

    #[test]
    fn test_from_headers_bad_date() {
        let before = Utc::now();
        let headers = Headers::parse("Date: the day after tomorrow\r\n");
        let envelope = Envelope::from_headers(&headers);
        assert!(envelope.date >= before);
        assert!(envelope.subject.is_empty());
    }
}
