//! FETCH response parsing.

use pocketmail_mime::{Envelope, MessagePart};
use tracing::warn;

use super::body_structure::part_from_body_structure;
use super::envelope::parse_envelope;
use super::value::{Value, ValueParser};
use crate::types::{Flag, Flags};
use crate::{Error, Result};

/// Data items of one `* <n> FETCH (...)` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Message sequence number.
    pub seq: u32,
    items: Vec<(String, Value)>,
}

impl FetchResponse {
    /// Looks up a data item by name (`ENVELOPE`, `BODY[1.2]`, ...).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Names of the data items present.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(key, _)| key.as_str())
    }

    /// The message flags, if FLAGS was returned.
    #[must_use]
    pub fn flags(&self) -> Option<Flags> {
        let list = self.get("FLAGS")?.as_list()?;
        Some(
            list.iter()
                .filter_map(Value::as_text)
                .map(|flag| Flag::parse(&flag))
                .collect(),
        )
    }

    /// Maps the ENVELOPE item.
    pub fn envelope(&self) -> Result<Envelope> {
        let value = self
            .get("ENVELOPE")
            .ok_or_else(|| Error::Malformed(format!("message {} has no ENVELOPE", self.seq)))?;
        parse_envelope(value)
    }

    /// Maps the ENVELOPE item, substituting [`Envelope::placeholder`] when
    /// it is missing or malformed.
    #[must_use]
    pub fn envelope_or_placeholder(&self) -> Envelope {
        self.envelope().unwrap_or_else(|e| {
            warn!(seq = self.seq, error = %e, "unparsable envelope, using placeholder");
            Envelope::placeholder()
        })
    }

    /// Maps the BODYSTRUCTURE item.
    pub fn body_structure(&self) -> Result<MessagePart> {
        let value = self.get("BODYSTRUCTURE").ok_or_else(|| {
            Error::Malformed(format!("message {} has no BODYSTRUCTURE", self.seq))
        })?;
        part_from_body_structure(value)
    }

    /// Raw content of `BODY[section]`. `NIL` content is `None`.
    #[must_use]
    pub fn body(&self, section: &str) -> Option<&[u8]> {
        self.get(&format!("BODY[{section}]"))?.as_bytes()
    }
}

/// Parses a `* <n> FETCH (...)` response.
///
/// The prefix is matched strictly: `*`, a space, a decimal sequence
/// number, a space, `FETCH`, a space, `(`. Returns `Ok(None)` for other
/// untagged responses; a response that starts like a FETCH but breaks the
/// grammar is an error.
pub fn parse_fetch_response(response: &[u8]) -> Result<Option<FetchResponse>> {
    const KEYWORD: &[u8] = b" FETCH";

    let Some(rest) = response.strip_prefix(b"* ") else {
        return Ok(None);
    };
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Ok(None);
    }
    let after_seq = &rest[digits..];
    if after_seq.len() < KEYWORD.len() || !after_seq[..KEYWORD.len()].eq_ignore_ascii_case(KEYWORD)
    {
        return Ok(None);
    }

    let seq = std::str::from_utf8(&rest[..digits])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::parse(2, "sequence number out of range"))?;

    let open = 2 + digits + KEYWORD.len();
    if response.get(open..open + 2) != Some(&b" ("[..]) {
        return Err(Error::parse(open, "expected ' (' after FETCH"));
    }

    let mut parser = ValueParser::at(response, open + 1);
    let list = parser.parse_value()?;
    if !parser.at_end() {
        return Err(Error::parse(parser.position(), "trailing data after FETCH list"));
    }
    let Value::List(values) = list else {
        return Err(Error::parse(open + 1, "expected FETCH list"));
    };

    if values.len() % 2 != 0 {
        return Err(Error::parse(open + 1, "FETCH list has a name without a value"));
    }

    let mut items = Vec::with_capacity(values.len() / 2);
    let mut values = values.into_iter();
    while let (Some(name), Some(value)) = (values.next(), values.next()) {
        let Value::Atom(name) = name else {
            return Err(Error::parse(open + 1, "FETCH item name is not an atom"));
        };
        items.push((normalize_item_name(&name), value));
    }

    Ok(Some(FetchResponse { seq, items }))
}

/// `body.peek[1]<0>` is reported back as `BODY[1]`.
fn normalize_item_name(name: &str) -> String {
    let mut name = name.to_ascii_uppercase();
    if let Some(rest) = name.strip_prefix("BODY.PEEK[") {
        name = format!("BODY[{rest}");
    }
    if name.ends_with('>')
        && let Some(origin) = name.rfind('<')
    {
        name.truncate(origin);
    }
    name
}
