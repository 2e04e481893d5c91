//! Message tokens and folder listings.

use std::ops::RangeInclusive;

use pocketmail_mime::{Envelope, MessagePart, PartContents};

/// Protocol-specific handle on a message.
///
/// Sequence numbers and POP3 indices are session-relative, so a token is
/// only meaningful for the connection that produced it. The POP3 form also
/// carries the UIDL value, which lets a stale index be detected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageToken {
    /// IMAP message sequence number.
    Imap {
        /// Sequence number in the selected mailbox.
        seq: u32,
    },
    /// POP3 message.
    Pop3 {
        /// Message number, stable for the session.
        index: u32,
        /// UIDL value, if the server supports UIDL.
        uid: Option<String>,
    },
}

impl MessageToken {
    /// Sequence number or message index.
    #[must_use]
    pub const fn number(&self) -> u32 {
        match self {
            Self::Imap { seq } => *seq,
            Self::Pop3 { index, .. } => *index,
        }
    }
}

impl std::fmt::Display for MessageToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imap { seq } => write!(f, "imap:{seq}"),
            Self::Pop3 {
                index,
                uid: Some(uid),
            } => write!(f, "pop3:{index}:{uid}"),
            Self::Pop3 { index, uid: None } => write!(f, "pop3:{index}"),
        }
    }
}

/// System flags of a listed message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[allow(clippy::struct_excessive_bools)]
pub struct MessageFlags {
    /// `\Seen`.
    pub seen: bool,
    /// `\Answered`.
    pub answered: bool,
    /// `\Flagged`.
    pub flagged: bool,
    /// `\Deleted`.
    pub deleted: bool,
    /// `\Draft`.
    pub draft: bool,
    /// `\Recent`.
    pub recent: bool,
}

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMessage {
    /// Handle for later requests.
    pub token: MessageToken,
    /// Header summary; a placeholder if the server's data was unusable.
    pub envelope: Envelope,
    /// Flags, updated in place by delete and undelete.
    pub flags: MessageFlags,
}

/// A downloaded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    /// The message's token.
    pub token: MessageToken,
    /// Header summary.
    pub envelope: Envelope,
    /// Part tree.
    pub root: MessagePart,
    /// Decoded content of the leaves that were downloaded.
    pub contents: PartContents,
    /// True if a size or line limit cut the download short.
    pub truncated: bool,
}

/// Which messages of a folder to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageRange {
    /// The newest messages.
    #[default]
    Newest,
    /// Messages `first..=last`, 1-based.
    Span {
        /// First message number.
        first: u32,
        /// Last message number.
        last: u32,
    },
}

impl MessageRange {
    /// Resolves the range against a folder of `count` messages, keeping at
    /// most the `max` newest. A `max` of 0 means no cap.
    #[must_use]
    pub fn clip(self, count: u32, max: u32) -> Option<RangeInclusive<u32>> {
        let (first, last) = match self {
            Self::Newest => (1, count),
            Self::Span { first, last } => (first.max(1), last.min(count)),
        };
        if first > last {
            return None;
        }
        let first = if max > 0 && last - first >= max {
            last - max + 1
        } else {
            first
        };
        Some(first..=last)
    }
}
