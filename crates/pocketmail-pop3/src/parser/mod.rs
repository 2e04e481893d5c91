//! POP3 reply parsing.
//!
//! Single-line replies start with `+OK` or `-ERR`. Multi-line bodies follow
//! a positive reply and end with a line holding a lone `.`; content lines
//! that begin with `.` arrive with an extra `.` prepended.

/// Status of a single-line reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Positive reply; the text after `+OK`.
    Ok(String),
    /// Negative reply; the text after `-ERR`.
    Err(String),
}

impl Reply {
    /// Classifies a reply line. Only a leading `-` marks an error.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        if line.starts_with('-') {
            Self::Err(status_text(line).to_string())
        } else {
            Self::Ok(status_text(line).to_string())
        }
    }

    /// Returns true for a positive reply.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Text after the status word.
fn status_text(line: &str) -> &str {
    line.split_once(' ').map_or("", |(_, rest)| rest.trim())
}

/// Returns true for the lone `.` that ends a multi-line body.
#[must_use]
pub fn is_terminator(line: &[u8]) -> bool {
    line == b"."
}

/// Removes the byte-stuffed leading `.` from a body line.
#[must_use]
pub fn unstuff(line: &[u8]) -> &[u8] {
    match line {
        [b'.', rest @ ..] if !rest.is_empty() => rest,
        _ => line,
    }
}

/// Message count from a STAT reply: the integer between the first and
/// second space (`+OK 5 1024` → 5).
#[must_use]
pub fn parse_stat(line: &str) -> Option<u32> {
    line.split(' ').nth(1)?.parse().ok()
}

/// UID from a single-message UIDL reply: the token after the last space
/// (`+OK 3 abc123` → `abc123`).
///
/// A reply without a message number and a UID is malformed and yields
/// `None`.
#[must_use]
pub fn parse_uidl(line: &str) -> Option<String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }
    fields.last().map(|uid| (*uid).to_string())
}

/// Message size from a single-message LIST reply (`+OK 2 320` → 320).
#[must_use]
pub fn parse_list_size(line: &str) -> Option<usize> {
    line.split_whitespace().nth(2)?.parse().ok()
}

/// Splits one line of a multi-line UIDL or LIST listing into message
/// number and the rest.
#[must_use]
pub fn parse_listing_entry(line: &str) -> Option<(u32, &str)> {
    let (msg, rest) = line.trim().split_once(' ')?;
    Some((msg.parse().ok()?, rest.trim()))
}

/// The `<...>` timestamp in a greeting that offers APOP.
#[must_use]
pub fn apop_timestamp(greeting: &str) -> Option<&str> {
    let start = greeting.find('<')?;
    let end = greeting[start..].find('>')? + start;
    let stamp = &greeting[start..=end];
    stamp.contains('@').then_some(stamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_classification() {
        assert_eq!(Reply::parse("+OK 2 messages"), Reply::Ok("2 messages".into()));
        assert_eq!(Reply::parse("+OK"), Reply::Ok(String::new()));
        assert_eq!(
            Reply::parse("-ERR no such message"),
            Reply::Err("no such message".into())
        );
        assert!(Reply::parse("+ ready").is_ok());
        assert!(!Reply::parse("-ERR").is_ok());
    }

    #[test]
    fn test_unstuff() {
        assert_eq!(unstuff(b"..hidden"), b".hidden");
        assert_eq!(unstuff(b".."), b".");
        assert_eq!(unstuff(b"plain"), b"plain");
        assert_eq!(unstuff(b""), b"");
        assert!(is_terminator(b"."));
        assert!(!is_terminator(b".."));
    }

    #[test]
    fn test_stat() {
        assert_eq!(parse_stat("+OK 5 1024"), Some(5));
        assert_eq!(parse_stat("+OK 0 0"), Some(0));
        assert_eq!(parse_stat("+OK"), None);
        assert_eq!(parse_stat("+OK lots"), None);
    }

    #[test]
    fn test_uidl() {
        assert_eq!(parse_uidl("+OK 3 abc123").as_deref(), Some("abc123"));
        assert_eq!(parse_uidl("+OK 3   whqtswO00WBw418f9t5JxYwZ").as_deref(), Some("whqtswO00WBw418f9t5JxYwZ"));
        assert_eq!(parse_uidl("+OK abc123"), None);
        assert_eq!(parse_uidl("+OK"), None);
    }

    #[test]
    fn test_list_size() {
        assert_eq!(parse_list_size("+OK 2 320"), Some(320));
        assert_eq!(parse_list_size("+OK 2"), None);
    }

    #[test]
    fn test_listing_entry() {
        assert_eq!(parse_listing_entry("1 uid-a"), Some((1, "uid-a")));
        assert_eq!(parse_listing_entry("2 200"), Some((2, "200")));
        assert_eq!(parse_listing_entry("x 200"), None);
        assert_eq!(parse_listing_entry("3"), None);
    }

    #[test]
    fn test_apop_timestamp() {
        assert_eq!(
            apop_timestamp("+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>"),
            Some("<1896.697170952@dbc.mtview.ca.us>")
        );
        assert_eq!(apop_timestamp("+OK ready"), None);
        assert_eq!(apop_timestamp("+OK <not a stamp>"), None);
    }
}
