//! IMAP data types returned by the client.

mod flags;

pub use flags::{Flag, Flags};

/// Whether STORE adds or removes flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    /// `+FLAGS.SILENT`.
    Add,
    /// `-FLAGS.SILENT`.
    Remove,
}

impl StoreAction {
    /// Wire form of the STORE data item.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+FLAGS.SILENT",
            Self::Remove => "-FLAGS.SILENT",
        }
    }
}

/// One mailbox from a LIST reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// `\HasChildren` was present.
    pub has_children: bool,
    /// `\Noselect` was absent.
    pub can_select: bool,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Full mailbox name.
    pub name: String,
}

/// Mailbox state reported by SELECT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// UIDVALIDITY value, if the server sent one.
    pub uid_validity: Option<u32>,
}

/// Counters reported by STATUS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderStatus {
    /// Number of messages.
    pub messages: u32,
    /// Number of messages without `\Seen`.
    pub unseen: u32,
}

/// Unsolicited mailbox change, seen during IDLE or after NOOP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxEvent {
    /// New message count.
    Exists(u32),
    /// New recent count.
    Recent(u32),
    /// A message was expunged.
    Expunge(u32),
    /// A message's flags changed.
    Flags {
        /// Message sequence number.
        seq: u32,
        /// Updated flags.
        flags: Flags,
    },
}
