//! Address list parsing and formatting.

use crate::encoding::decode_rfc2047;

/// Splits an address list header on commas outside quotes, comments and
/// angle brackets.
///
/// Each entry is trimmed, RFC 2047-decoded and normalized to
/// `Name <mailbox@host>` or `mailbox@host`. Empty entries are dropped.
#[must_use]
pub fn parse_address_list(value: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle_depth = 0u32;
    let mut comment_depth = 0u32;

    for c in value.chars() {
        if escaped {
            escaped = false;
            current.push(c);
            continue;
        }
        match c {
            '\\' if in_quotes || comment_depth > 0 => escaped = true,
            '"' if comment_depth == 0 => in_quotes = !in_quotes,
            '(' if !in_quotes => comment_depth += 1,
            ')' if !in_quotes => comment_depth = comment_depth.saturating_sub(1),
            '<' if !in_quotes && comment_depth == 0 => angle_depth += 1,
            '>' if !in_quotes && comment_depth == 0 => angle_depth = angle_depth.saturating_sub(1),
            ',' if !in_quotes && angle_depth == 0 && comment_depth == 0 => {
                push_address(&mut result, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    push_address(&mut result, &current);

    result
}

fn push_address(result: &mut Vec<String>, raw: &str) {
    let raw = raw.trim();
    if raw.is_empty() {
        return;
    }
    result.push(normalize_address(raw));
}

/// Normalizes one address to `Name <mailbox@host>` or `mailbox@host`.
fn normalize_address(raw: &str) -> String {
    let Some(open) = raw.rfind('<') else {
        // Bare address, possibly with a trailing "(Name)" comment.
        return match (raw.find('('), raw.rfind(')')) {
            (Some(start), Some(end)) if start < end => {
                let addr = raw[..start].trim();
                let name = decode_rfc2047(raw[start + 1..end].trim());
                format_address(Some(&name), addr)
            }
            _ => raw.to_string(),
        };
    };

    let close = raw[open..].find('>').map_or(raw.len(), |i| open + i);
    let addr = raw[open + 1..close].trim();
    let name = raw[..open].trim();
    let name = name
        .strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .map_or_else(|| name.to_string(), |n| n.replace("\\\"", "\"").replace("\\\\", "\\"));
    let name = decode_rfc2047(&name);
    format_address(Some(&name), addr)
}

/// Formats an address from a display name and an address spec.
///
/// Returns `Name <addr>` when the name is present and non-empty, else
/// just `addr`.
#[must_use]
pub fn format_address(name: Option<&str>, addr: &str) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => format!("{name} <{addr}>"),
        _ => addr.to_string(),
    }
}

/// Extracts the bare address from `Name <addr>`, or returns the input trimmed.
#[must_use]
pub fn address_only(address: &str) -> &str {
    let address = address.trim();
    match (address.rfind('<'), address.rfind('>')) {
        (Some(open), Some(close)) if open < close => address[open + 1..close].trim(),
        _ => address,
    }
}

/// Formats an address list for a header, quoting display names that
/// need it and RFC 2047-encoding non-ASCII names.
#[must_use]
pub fn format_address_header(addresses: &[String]) -> String {
    addresses
        .iter()
        .map(|address| {
            let addr = address_only(address);
            let name = address
                .trim()
                .rfind('<')
                .map(|open| address.trim()[..open].trim())
                .filter(|name| !name.is_empty());
            match name {
                None => addr.to_string(),
                Some(name) if !name.is_ascii() => {
                    format!("{} <{addr}>", crate::encoding::encode_rfc2047(name))
                }
                Some(name) if name.contains(|c: char| "()<>[]:;@\\,.\"".contains(c)) => {
                    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                    format!("\"{escaped}\" <{addr}>")
                }
                Some(name) => format!("{name} <{addr}>"),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_list() {
        let list = parse_address_list("a@example.com, Bob <b@example.com>");
        assert_eq!(list, vec!["a@example.com", "Bob <b@example.com>"]);
    }

    #[test]
    fn test_parse_quoted_comma() {
        let list = parse_address_list("\"Doe, Jane\" <jane@example.com>, x@example.com");
        assert_eq!(list, vec!["Doe, Jane <jane@example.com>", "x@example.com"]);
    }

    #[test]
    fn test_parse_encoded_name() {
        let list = parse_address_list("=?utf-8?Q?Ren=C3=A9?= <rene@example.com>");
        assert_eq!(list, vec!["René <rene@example.com>"]);
    }

    #[test]
    fn test_parse_comment_name() {
        let list = parse_address_list("joe@example.com (Joe, Jr.)");
        assert_eq!(list, vec!["Joe, Jr. <joe@example.com>"]);
    }

    #[test]
    fn test_parse_empty_entries() {
        assert!(parse_address_list("").is_empty());
        assert_eq!(parse_address_list(" , a@b.c ,"), vec!["a@b.c"]);
    }

    #[test]
    fn test_address_only() {
        assert_eq!(address_only("Name <a@b.c>"), "a@b.c");
        assert_eq!(address_only("  a@b.c "), "a@b.c");
        assert_eq!(address_only("\"X\" < a@b.c >"), "a@b.c");
    }

    #[test]
    fn test_format_address() {
        assert_eq!(format_address(Some("Ann"), "ann@x.org"), "Ann <ann@x.org>");
        assert_eq!(format_address(Some(" "), "ann@x.org"), "ann@x.org");
        assert_eq!(format_address(None, "ann@x.org"), "ann@x.org");
    }

    #[test]
    fn test_format_header_roundtrip() {
        let addresses = vec![
            "Doe, Jane <jane@example.com>".to_string(),
            "René <rene@example.com>".to_string(),
            "plain@example.com".to_string(),
        ];
        let header = format_address_header(&addresses);
        assert!(header.starts_with("\"Doe, Jane\" <jane@example.com>, =?UTF-8?B?"));
        assert_eq!(parse_address_list(&header), addresses);
    }
}
