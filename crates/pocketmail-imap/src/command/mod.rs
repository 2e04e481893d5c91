//! IMAP command builder.
//!
//! This module provides the commands the client issues and their wire form.

mod tag_generator;

use std::fmt::Write as _;

use crate::types::{Flag, StoreAction};

pub use tag_generator::TagGenerator;

/// A data item requested by FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `ENVELOPE`.
    Envelope,
    /// `BODYSTRUCTURE`.
    BodyStructure,
    /// `FLAGS`.
    Flags,
    /// `BODY[section]`, or `BODY.PEEK[section]` when `peek` is set.
    Body {
        /// Section specifier (`1.2`, `HEADER`, or empty for the whole message).
        section: String,
        /// Leave the `\Seen` flag untouched.
        peek: bool,
    },
}

impl FetchAttribute {
    /// `BODY.PEEK[section]`.
    #[must_use]
    pub fn body_peek(section: impl Into<String>) -> Self {
        Self::Body {
            section: section.into(),
            peek: true,
        }
    }

    fn write(&self, buf: &mut String) {
        match self {
            Self::Envelope => buf.push_str("ENVELOPE"),
            Self::BodyStructure => buf.push_str("BODYSTRUCTURE"),
            Self::Flags => buf.push_str("FLAGS"),
            Self::Body { section, peek } => {
                buf.push_str(if *peek { "BODY.PEEK[" } else { "BODY[" });
                buf.push_str(section);
                buf.push(']');
            }
        }
    }
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern with `%`/`*` wildcards.
        pattern: String,
    },
    /// STATUS command asking for MESSAGES and UNSEEN.
    Status {
        /// Mailbox to query.
        mailbox: String,
    },
    /// CLOSE command.
    Close,
    /// EXPUNGE command.
    Expunge,
    /// FETCH command.
    Fetch {
        /// Sequence set (`1:10`, `7`, `3,5`).
        range: String,
        /// Data items to fetch.
        items: Vec<FetchAttribute>,
    },
    /// STORE command (silent variant).
    Store {
        /// Message sequence number.
        seq: u32,
        /// Add or remove.
        action: StoreAction,
        /// Flags to change.
        flags: Vec<Flag>,
    },
    /// IDLE command (RFC 2177).
    Idle,
}

impl Command {
    /// Returns the command keyword.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::List { .. } => "LIST",
            Self::Status { .. } => "STATUS",
            Self::Close => "CLOSE",
            Self::Expunge => "EXPUNGE",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Idle => "IDLE",
        }
    }

    /// Serializes the command line, without the trailing CRLF.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> String {
        let mut buf = format!("{tag} {}", self.name());

        match self {
            Self::Capability
            | Self::Noop
            | Self::Logout
            | Self::StartTls
            | Self::Close
            | Self::Expunge
            | Self::Idle => {}
            Self::Login { username, password } => {
                buf.push(' ');
                write_quoted(&mut buf, username);
                buf.push(' ');
                write_quoted(&mut buf, password);
            }
            Self::Select { mailbox } => {
                buf.push(' ');
                write_quoted(&mut buf, mailbox);
            }
            Self::List { reference, pattern } => {
                buf.push(' ');
                write_quoted(&mut buf, reference);
                buf.push(' ');
                write_quoted(&mut buf, pattern);
            }
            Self::Status { mailbox } => {
                buf.push(' ');
                write_quoted(&mut buf, mailbox);
                buf.push_str(" (MESSAGES UNSEEN)");
            }
            Self::Fetch { range, items } => {
                buf.push(' ');
                buf.push_str(range);
                buf.push(' ');
                if let [item] = items.as_slice() {
                    item.write(&mut buf);
                } else {
                    buf.push('(');
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            buf.push(' ');
                        }
                        item.write(&mut buf);
                    }
                    buf.push(')');
                }
            }
            Self::Store { seq, action, flags } => {
                let _ = write!(buf, " {seq} {} (", action.as_str());
                for (i, flag) in flags.iter().enumerate() {
                    if i > 0 {
                        buf.push(' ');
                    }
                    buf.push_str(flag.as_str());
                }
                buf.push(')');
            }
        }

        buf
    }

    /// Serialized form safe for logs: credentials are masked.
    #[must_use]
    pub fn redacted(&self, tag: &str) -> String {
        match self {
            Self::Login { username, .. } => {
                let mut buf = format!("{tag} LOGIN ");
                write_quoted(&mut buf, username);
                buf.push_str(" \"***\"");
                buf
            }
            _ => self.serialize(tag),
        }
    }
}

/// Writes `s` as an IMAP quoted string, escaping `\` and `"`.
pub fn write_quoted(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            buf.push('\\');
        }
        buf.push(c);
    }
    buf.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::Capability.serialize("A0"), "A0 CAPABILITY");
        assert_eq!(Command::Noop.serialize("A7"), "A7 NOOP");
        assert_eq!(Command::Idle.serialize("A2"), "A2 IDLE");
    }

    #[test]
    fn test_login_quotes_credentials() {
        let cmd = Command::Login {
            username: "user@example.com".into(),
            password: r#"pa"ss\word"#.into(),
        };
        assert_eq!(
            cmd.serialize("A1"),
            r#"A1 LOGIN "user@example.com" "pa\"ss\\word""#
        );
        assert_eq!(cmd.redacted("A1"), r#"A1 LOGIN "user@example.com" "***""#);
    }

    #[test]
    fn test_list_and_select() {
        let list = Command::List {
            reference: String::new(),
            pattern: "Work/%".into(),
        };
        assert_eq!(list.serialize("A3"), r#"A3 LIST "" "Work/%""#);

        let select = Command::Select {
            mailbox: "My Folder".into(),
        };
        assert_eq!(select.serialize("A4"), r#"A4 SELECT "My Folder""#);

        let status = Command::Status {
            mailbox: "INBOX".into(),
        };
        assert_eq!(status.serialize("A5"), r#"A5 STATUS "INBOX" (MESSAGES UNSEEN)"#);
    }

    #[test]
    fn test_fetch_items() {
        let single = Command::Fetch {
            range: "1:10".into(),
            items: vec![FetchAttribute::Envelope],
        };
        assert_eq!(single.serialize("A1"), "A1 FETCH 1:10 ENVELOPE");

        let many = Command::Fetch {
            range: "4".into(),
            items: vec![
                FetchAttribute::Flags,
                FetchAttribute::BodyStructure,
                FetchAttribute::body_peek("1.2"),
                FetchAttribute::Body {
                    section: String::new(),
                    peek: false,
                },
            ],
        };
        assert_eq!(
            many.serialize("A2"),
            "A2 FETCH 4 (FLAGS BODYSTRUCTURE BODY.PEEK[1.2] BODY[])"
        );
    }

    #[test]
    fn test_store() {
        let cmd = Command::Store {
            seq: 3,
            action: StoreAction::Add,
            flags: vec![Flag::Deleted],
        };
        assert_eq!(cmd.serialize("A9"), r"A9 STORE 3 +FLAGS.SILENT (\Deleted)");

        let cmd = Command::Store {
            seq: 3,
            action: StoreAction::Remove,
            flags: vec![Flag::Deleted, Flag::Seen],
        };
        assert_eq!(
            cmd.serialize("A10"),
            r"A10 STORE 3 -FLAGS.SILENT (\Deleted \Seen)"
        );
    }
}
