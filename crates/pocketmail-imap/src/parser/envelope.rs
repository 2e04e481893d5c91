//! ENVELOPE mapping.

use pocketmail_mime::encoding::decode_rfc2047;
use pocketmail_mime::{Envelope, format_address, parse_date_or_now};

use super::value::Value;
use crate::{Error, Result};

/// Number of positional fields in an ENVELOPE.
const ENVELOPE_FIELDS: usize = 10;

/// Maps an ENVELOPE structure to an [`Envelope`].
///
/// Fields are date, subject, from, sender, reply-to, to, cc, bcc,
/// in-reply-to and message-id. A structure with fewer fields, or a
/// non-list where an address list belongs, is an error; callers that must
/// keep going use [`Envelope::placeholder`] instead.
pub fn parse_envelope(value: &Value) -> Result<Envelope> {
    let fields = value
        .as_list()
        .ok_or_else(|| Error::Malformed("ENVELOPE is not a list".to_string()))?;
    if fields.len() < ENVELOPE_FIELDS {
        return Err(Error::Malformed(format!(
            "ENVELOPE has {} fields, expected {ENVELOPE_FIELDS}",
            fields.len()
        )));
    }

    let date = fields[0]
        .as_text()
        .map_or_else(chrono::Utc::now, |date| parse_date_or_now(&date));

    Ok(Envelope {
        date,
        subject: fields[1]
            .as_text()
            .map(|subject| decode_rfc2047(&subject))
            .unwrap_or_default(),
        from: parse_addresses(&fields[2])?,
        sender: parse_addresses(&fields[3])?,
        reply_to: parse_addresses(&fields[4])?,
        to: parse_addresses(&fields[5])?,
        cc: parse_addresses(&fields[6])?,
        bcc: parse_addresses(&fields[7])?,
        in_reply_to: optional_text(&fields[8]),
        message_id: optional_text(&fields[9]),
    })
}

fn optional_text(value: &Value) -> Option<String> {
    value
        .as_text()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Maps an address list. Group start/end markers (NIL host) are skipped.
fn parse_addresses(value: &Value) -> Result<Vec<String>> {
    let entries = match value {
        Value::Nil => return Ok(Vec::new()),
        Value::List(entries) => entries,
        _ => return Err(Error::Malformed("address list is not a list".to_string())),
    };

    let mut addresses = Vec::with_capacity(entries.len());
    for entry in entries {
        let parts = entry
            .as_list()
            .filter(|parts| parts.len() >= 4)
            .ok_or_else(|| Error::Malformed("address is not a 4-tuple".to_string()))?;

        let (Some(mailbox), Some(host)) = (parts[2].as_text(), parts[3].as_text()) else {
            continue;
        };
        let name = parts[0].as_text().map(|name| decode_rfc2047(&name));
        addresses.push(format_address(name.as_deref(), &format!("{mailbox}@{host}")));
    }
    Ok(addresses)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;
    use crate::parser::value::parse_value;

    const FULL: &[u8] = br#"("Mon, 7 Feb 1994 21:52:25 -0800" "=?ISO-8859-1?Q?caf=E9?=" (("Ann Smith" NIL "ann" "example.com")) ((NIL NIL "ann" "example.com")) NIL (("=?UTF-8?B?QsO2Yg==?=" NIL "bob" "example.org") (NIL NIL "cy" "example.net")) NIL NIL "<parent@example.com>" "<id1@example.com>")"#;

    #[test]
    fn test_full_envelope() {
        let envelope = parse_envelope(&parse_value(FULL).unwrap()).unwrap();

        assert_eq!(envelope.subject, "café");
        assert_eq!(envelope.from, vec!["Ann Smith <ann@example.com>"]);
        assert_eq!(envelope.sender, vec!["ann@example.com"]);
        assert!(envelope.reply_to.is_empty());
        assert_eq!(envelope.to, vec!["Böb <bob@example.org>", "cy@example.net"]);
        assert!(envelope.cc.is_empty());
        assert_eq!(envelope.in_reply_to.as_deref(), Some("<parent@example.com>"));
        assert_eq!(envelope.message_id.as_deref(), Some("<id1@example.com>"));
        assert_eq!(envelope.date.year(), 1994);
        assert_eq!(envelope.date.hour(), 5);
    }

    #[test]
    fn test_group_markers_skipped() {
        let value = parse_value(
            br#"(NIL "s" NIL NIL NIL ((NIL NIL "team" NIL) (NIL NIL "dan" "example.com") (NIL NIL NIL NIL)) NIL NIL NIL NIL)"#,
        )
        .unwrap();
        let envelope = parse_envelope(&value).unwrap();
        assert_eq!(envelope.to, vec!["dan@example.com"]);
        assert_eq!(envelope.subject, "s");
        assert!(envelope.message_id.is_none());
    }

    #[test]
    fn test_short_envelope_is_error() {
        let value = parse_value(br#"(NIL "subject" NIL NIL NIL NIL NIL NIL NIL)"#).unwrap();
        assert!(matches!(parse_envelope(&value), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_wrong_types_are_errors() {
        let atom_for_list =
            parse_value(br#"(NIL "s" "ann@example.com" NIL NIL NIL NIL NIL NIL NIL)"#).unwrap();
        assert!(parse_envelope(&atom_for_list).is_err());

        let short_address =
            parse_value(br#"(NIL "s" (("Ann" NIL "ann")) NIL NIL NIL NIL NIL NIL NIL)"#).unwrap();
        assert!(parse_envelope(&short_address).is_err());

        assert!(parse_envelope(&Value::Nil).is_err());
    }
}
