//! POP3 commands (RFC 1939, RFC 2449, RFC 2595).

use std::fmt::Write as _;

/// A POP3 command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// USER name.
    User(String),
    /// PASS secret.
    Pass(String),
    /// APOP name digest.
    Apop {
        /// Mailbox name.
        user: String,
        /// Hex MD5 of timestamp and secret.
        digest: String,
    },
    /// CAPA.
    Capa,
    /// STLS.
    Stls,
    /// STAT.
    Stat,
    /// LIST, for one message or all.
    List(Option<u32>),
    /// UIDL, for one message or all.
    Uidl(Option<u32>),
    /// TOP msg lines.
    Top {
        /// Message number.
        msg: u32,
        /// Body lines to include after the headers.
        lines: u32,
    },
    /// RETR msg.
    Retr(u32),
    /// DELE msg.
    Dele(u32),
    /// RSET.
    Rset,
    /// NOOP.
    Noop,
    /// QUIT.
    Quit,
}

impl Command {
    /// Returns the command keyword.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::User(_) => "USER",
            Self::Pass(_) => "PASS",
            Self::Apop { .. } => "APOP",
            Self::Capa => "CAPA",
            Self::Stls => "STLS",
            Self::Stat => "STAT",
            Self::List(_) => "LIST",
            Self::Uidl(_) => "UIDL",
            Self::Top { .. } => "TOP",
            Self::Retr(_) => "RETR",
            Self::Dele(_) => "DELE",
            Self::Rset => "RSET",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
    }

    /// Returns true if a successful reply is followed by a dot-terminated
    /// body.
    #[must_use]
    pub const fn is_multiline(&self) -> bool {
        matches!(
            self,
            Self::Capa | Self::List(None) | Self::Uidl(None) | Self::Top { .. } | Self::Retr(_)
        )
    }

    /// Serializes the command line, without the terminator.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut line = self.name().to_string();
        match self {
            Self::User(arg) | Self::Pass(arg) => {
                line.push(' ');
                line.push_str(arg);
            }
            Self::Apop { user, digest } => {
                let _ = write!(line, " {user} {digest}");
            }
            Self::List(Some(msg)) | Self::Uidl(Some(msg)) | Self::Retr(msg) | Self::Dele(msg) => {
                let _ = write!(line, " {msg}");
            }
            Self::Top { msg, lines } => {
                let _ = write!(line, " {msg} {lines}");
            }
            Self::Capa
            | Self::Stls
            | Self::Stat
            | Self::List(None)
            | Self::Uidl(None)
            | Self::Rset
            | Self::Noop
            | Self::Quit => {}
        }
        line
    }

    /// Serializes the command for logging, with secrets masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ***".to_string(),
            Self::Apop { user, .. } => format!("APOP {user} ***"),
            _ => self.serialize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize() {
        assert_eq!(Command::User("ann".into()).serialize(), "USER ann");
        assert_eq!(Command::Stat.serialize(), "STAT");
        assert_eq!(Command::Uidl(Some(3)).serialize(), "UIDL 3");
        assert_eq!(Command::Uidl(None).serialize(), "UIDL");
        assert_eq!(Command::Top { msg: 2, lines: 0 }.serialize(), "TOP 2 0");
        assert_eq!(Command::Dele(9).serialize(), "DELE 9");
    }

    #[test]
    fn test_multiline() {
        assert!(Command::Capa.is_multiline());
        assert!(Command::Retr(1).is_multiline());
        assert!(Command::Uidl(None).is_multiline());
        assert!(!Command::Uidl(Some(1)).is_multiline());
        assert!(!Command::Stat.is_multiline());
    }

    #[test]
    fn test_redacted() {
        assert_eq!(Command::Pass("hunter2".into()).redacted(), "PASS ***");
        let apop = Command::Apop {
            user: "ann".into(),
            digest: "c4c9334bac560ecc979e58001b3e22fb".into(),
        };
        assert_eq!(apop.redacted(), "APOP ann ***");
        assert_eq!(Command::Noop.redacted(), "NOOP");
    }
}
