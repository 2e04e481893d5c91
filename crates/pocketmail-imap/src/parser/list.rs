//! LIST response parsing.

use super::value::{Value, ValueParser};
use crate::types::ListEntry;
use crate::{Error, Result};

/// Parses a `* LIST (flags) delimiter name` response.
///
/// Returns `Ok(None)` for any other response.
pub fn parse_list_response(response: &[u8]) -> Result<Option<ListEntry>> {
    const PREFIX: &[u8] = b"* LIST ";
    if response.len() < PREFIX.len() || !response[..PREFIX.len()].eq_ignore_ascii_case(PREFIX) {
        return Ok(None);
    }

    let mut parser = ValueParser::at(response, PREFIX.len());

    let flags = parser.parse_value()?;
    let flags = flags
        .as_list()
        .ok_or_else(|| Error::parse(PREFIX.len(), "LIST flags are not a list"))?;
    let has_flag = |name: &str| {
        flags
            .iter()
            .filter_map(Value::as_text)
            .any(|flag| flag.eq_ignore_ascii_case(name))
    };
    let has_children = has_flag("\\HasChildren");
    let can_select = !has_flag("\\Noselect") && !has_flag("\\NonExistent");

    let delimiter = match parser.parse_value()? {
        Value::Nil => None,
        value => value.as_text().and_then(|d| d.chars().next()),
    };

    let name = parser
        .parse_value()?
        .as_text()
        .map(std::borrow::Cow::into_owned)
        .ok_or_else(|| Error::parse(parser.position(), "LIST mailbox name missing"))?;

    Ok(Some(ListEntry {
        has_children,
        can_select,
        delimiter,
        name,
    }))
}
