//! Untagged status responses: CAPABILITY, EXISTS/RECENT/EXPUNGE, STATUS.

use super::fetch::parse_fetch_response;
use super::value::ValueParser;
use crate::types::{FolderStatus, MailboxEvent, MailboxStatus};
use crate::{Error, Result};

/// Splits a response into words.
fn words(response: &[u8]) -> impl Iterator<Item = &str> {
    std::str::from_utf8(response)
        .unwrap_or_default()
        .split_ascii_whitespace()
}

/// Extracts capability names from `* CAPABILITY ...` or from a
/// `[CAPABILITY ...]` code on an OK/PREAUTH status (as in a greeting or
/// LOGIN completion).
#[must_use]
pub fn parse_capabilities(response: &[u8]) -> Option<Vec<String>> {
    let text = String::from_utf8_lossy(response);
    let (first, rest) = text.split_once(' ')?;
    let upper = rest.to_ascii_uppercase();

    let list = if first == "*" && upper.starts_with("CAPABILITY ") {
        &rest["CAPABILITY ".len()..]
    } else {
        let start = ["OK [CAPABILITY ", "PREAUTH [CAPABILITY "]
            .iter()
            .find(|prefix| upper.starts_with(*prefix))?
            .len();
        let end = rest[start..].find(']')? + start;
        &rest[start..end]
    };

    Some(list.split_ascii_whitespace().map(str::to_string).collect())
}

/// Parses `* <n> EXISTS|RECENT|EXPUNGE` and flag-only `* <n> FETCH` updates.
#[must_use]
pub fn parse_mailbox_event(response: &[u8]) -> Option<MailboxEvent> {
    let mut parts = words(response);
    if parts.next() != Some("*") {
        return None;
    }
    let n: u32 = parts.next()?.parse().ok()?;
    let keyword = parts.next()?.to_ascii_uppercase();

    match keyword.as_str() {
        "EXISTS" => Some(MailboxEvent::Exists(n)),
        "RECENT" => Some(MailboxEvent::Recent(n)),
        "EXPUNGE" => Some(MailboxEvent::Expunge(n)),
        "FETCH" => {
            let fetch = parse_fetch_response(response).ok()??;
            Some(MailboxEvent::Flags {
                seq: fetch.seq,
                flags: fetch.flags()?,
            })
        }
        _ => None,
    }
}

/// Collects the SELECT results from its untagged responses.
#[must_use]
pub fn parse_select(responses: &[Vec<u8>]) -> MailboxStatus {
    let mut status = MailboxStatus::default();

    for response in responses {
        match parse_mailbox_event(response) {
            Some(MailboxEvent::Exists(n)) => status.exists = n,
            Some(MailboxEvent::Recent(n)) => status.recent = n,
            _ => {
                let text = String::from_utf8_lossy(response).to_ascii_uppercase();
                if let Some(start) = text.find("[UIDVALIDITY ") {
                    let rest = &text[start + "[UIDVALIDITY ".len()..];
                    status.uid_validity = rest
                        .split(']')
                        .next()
                        .and_then(|n| n.trim().parse().ok());
                }
            }
        }
    }

    status
}

/// Parses `* STATUS <mailbox> (MESSAGES n UNSEEN m)`.
///
/// Returns `Ok(None)` for any other response.
pub fn parse_status_response(response: &[u8]) -> Result<Option<FolderStatus>> {
    const PREFIX: &[u8] = b"* STATUS ";
    if response.len() < PREFIX.len() || !response[..PREFIX.len()].eq_ignore_ascii_case(PREFIX) {
        return Ok(None);
    }

    let mut parser = ValueParser::at(response, PREFIX.len());
    let _mailbox = parser.parse_value()?;
    let position = parser.position();
    let items = parser.parse_value()?;
    let items = items
        .as_list()
        .ok_or_else(|| Error::parse(position, "STATUS items are not a list"))?;

    let mut status = FolderStatus::default();
    for pair in items.chunks_exact(2) {
        let (Some(name), Some(value)) = (pair[0].as_text(), pair[1].as_number()) else {
            continue;
        };
        match name.to_ascii_uppercase().as_str() {
            "MESSAGES" => status.messages = value,
            "UNSEEN" => status.unseen = value,
            _ => {}
        }
    }
    Ok(Some(status))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Flag;

    #[test]
    fn test_capabilities() {
        assert_eq!(
            parse_capabilities(b"* CAPABILITY IMAP4rev1 IDLE AUTH=PLAIN").unwrap(),
            vec!["IMAP4rev1", "IDLE", "AUTH=PLAIN"]
        );
        assert_eq!(
            parse_capabilities(b"* OK [CAPABILITY IMAP4rev1 STARTTLS] ready").unwrap(),
            vec!["IMAP4rev1", "STARTTLS"]
        );
        assert_eq!(
            parse_capabilities(b"A1 OK [CAPABILITY IMAP4rev1 IDLE] Logged in").unwrap(),
            vec!["IMAP4rev1", "IDLE"]
        );
        assert!(parse_capabilities(b"* OK ready").is_none());
        assert!(parse_capabilities(b"* 1 FETCH (BODY[] \"[CAPABILITY X]\")").is_none());
    }

    #[test]
    fn test_mailbox_events() {
        assert_eq!(parse_mailbox_event(b"* 23 EXISTS"), Some(MailboxEvent::Exists(23)));
        assert_eq!(parse_mailbox_event(b"* 1 recent"), Some(MailboxEvent::Recent(1)));
        assert_eq!(parse_mailbox_event(b"* 4 EXPUNGE"), Some(MailboxEvent::Expunge(4)));

        let Some(MailboxEvent::Flags { seq, flags }) =
            parse_mailbox_event(br"* 7 FETCH (FLAGS (\Deleted))")
        else {
            panic!("expected flag update");
        };
        assert_eq!(seq, 7);
        assert!(flags.contains(&Flag::Deleted));

        assert!(parse_mailbox_event(b"* OK still here").is_none());
        assert!(parse_mailbox_event(b"+ idling").is_none());
    }

    #[test]
    fn test_select() {
        let responses: Vec<Vec<u8>> = [
            &br"* FLAGS (\Answered \Flagged \Deleted \Seen \Draft)"[..],
            b"* 172 EXISTS",
            b"* 1 RECENT",
            b"* OK [UNSEEN 12] Message 12 is first unseen",
            b"* OK [UIDVALIDITY 3857529045] UIDs valid",
        ]
        .iter()
        .map(|r| r.to_vec())
        .collect();

        let status = parse_select(&responses);
        assert_eq!(status.exists, 172);
        assert_eq!(status.recent, 1);
        assert_eq!(status.uid_validity, Some(3_857_529_045));
    }

    #[test]
    fn test_status() {
        let status = parse_status_response(br#"* STATUS "Sent Items" (MESSAGES 231 UNSEEN 4)"#)
            .unwrap()
            .unwrap();
        assert_eq!(status, FolderStatus { messages: 231, unseen: 4 });

        assert!(parse_status_response(b"* 3 EXISTS").unwrap().is_none());
        assert!(parse_status_response(b"* STATUS INBOX MESSAGES").is_err());
    }
}
