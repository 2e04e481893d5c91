//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header encoding and the
//! handful of charsets mail servers commonly label text with.

use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::Result;

/// Maximum encoded line length for Base64 and Quoted-Printable bodies.
const MAX_LINE_LENGTH: usize = 76;

/// Maximum number of raw bytes packed into one RFC 2047 encoded word.
const ENCODED_WORD_CHUNK: usize = 45;

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at 76 columns with CRLF line breaks.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    // Base64 output is pure ASCII, so byte chunks are valid str slices.
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        result.extend(chunk.iter().map(|&b| char::from(b)));
    }

    result
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes bytes using Quoted-Printable encoding (RFC 2045).
///
/// CRLF pairs are kept as hard line breaks; lone CR or LF, `=`, non-ASCII
/// bytes and whitespace before a line break are escaped. Lines are
/// soft-wrapped so none exceeds 76 characters.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3 / 2);
    let mut line_length = 0;
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];

        if byte == b'\r' && data.get(i + 1) == Some(&b'\n') {
            result.push_str("\r\n");
            line_length = 0;
            i += 2;
            continue;
        }

        let at_line_end = i + 1 == data.len() || data[i + 1..].starts_with(b"\r\n");
        let literal = match byte {
            b'=' => false,
            b'!'..=b'~' => true,
            b' ' | b'\t' => !at_line_end,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Leave room for the trailing '=' of a soft line break.
        if line_length + width > MAX_LINE_LENGTH - 1 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            result.push(char::from(byte));
        } else {
            let _ = write!(result, "={byte:02X}");
        }
        line_length += width;
        i += 1;
    }

    result
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Malformed escapes are kept verbatim rather than rejected.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break
        if data[i + 1..].starts_with(b"\r\n") {
            i += 3;
            continue;
        }
        if data.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }

        match (hex_value(data.get(i + 1)), hex_value(data.get(i + 2))) {
            (Some(high), Some(low)) => {
                result.push((high << 4) | low);
                i += 3;
            }
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

fn hex_value(byte: Option<&u8>) -> Option<u8> {
    let byte = *byte?;
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Encodes a header value using RFC 2047 encoded words if it needs it.
///
/// Values that are plain printable ASCII are returned unchanged. Others are
/// split into UTF-8 Base64 words, folded onto continuation lines.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    let plain = text
        .chars()
        .all(|c| (c.is_ascii_graphic() || c == ' ') && c != '\r' && c != '\n');
    if plain && !text.contains("=?") {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (idx, ch) in text.char_indices() {
        let next = idx + ch.len_utf8();
        if next - start > ENCODED_WORD_CHUNK && end > start {
            words.push(&text[start..end]);
            start = end;
        }
        end = next;
    }
    if end > start {
        words.push(&text[start..end]);
    }

    words
        .iter()
        .map(|w| format!("=?UTF-8?B?{}?=", encode_base64(w.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped. Words that
/// cannot be decoded are left as they are.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        if let Some((decoded, consumed)) = decode_encoded_word(candidate) {
            if !(after_word && before.trim().is_empty()) {
                result.push_str(before);
            }
            result.push_str(&decoded);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            result.push_str(before);
            result.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }

    result.push_str(rest);
    result
}

/// Decodes one `=?charset?encoding?text?=` word at the start of `s`.
///
/// Returns the decoded text and the number of bytes consumed.
fn decode_encoded_word(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix("=?")?;
    let (charset, after_charset) = body.split_once('?')?;
    let (encoding, after_encoding) = after_charset.split_once('?')?;
    let end = after_encoding.find("?=")?;
    let payload = &after_encoding[..end];

    if payload.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload).ok()?,
        "Q" | "q" => decode_quoted_printable(payload.replace('_', " ").as_bytes()),
        _ => return None,
    };

    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);
    let header_len = body.len() - after_encoding.len();
    let consumed = 2 + header_len + end + 2;
    Some((decode_charset(&bytes, charset), consumed))
}

/// Code points for windows-1252 bytes 0x80..=0x9F. The five bytes the
/// code page leaves undefined pass through as C1 controls.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

fn windows_1252_char(b: u8) -> char {
    match b {
        0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
        _ => char::from(b),
    }
}

fn windows_1252_byte(c: char) -> u8 {
    let high = WINDOWS_1252_HIGH
        .iter()
        .position(|&high| high == c)
        .and_then(|i| u8::try_from(i).ok());
    if let Some(i) = high {
        return 0x80 + i;
    }
    match u8::try_from(u32::from(c)) {
        Ok(b) if !(0x80..=0x9F).contains(&b) => b,
        _ => b'?',
    }
}

/// Converts bytes labelled with `charset` into a string.
///
/// Latin-1 maps bytes directly to code points and windows-1252 differs
/// only in 0x80..=0x9F. Everything else is treated as UTF-8 with invalid
/// sequences replaced.
#[must_use]
pub fn decode_charset(data: &[u8], charset: &str) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => {
            data.iter().map(|&b| char::from(b)).collect()
        }
        "windows-1252" | "cp1252" => data.iter().map(|&b| windows_1252_char(b)).collect(),
        _ => String::from_utf8_lossy(data).into_owned(),
    }
}

/// Converts a string into bytes in `charset`.
///
/// Characters the single-byte charsets cannot represent become `?`.
#[must_use]
pub fn encode_charset(text: &str, charset: &str) -> Vec<u8> {
    match charset.trim().to_ascii_lowercase().as_str() {
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect(),
        "windows-1252" | "cp1252" => text.chars().map(windows_1252_byte).collect(),
        "us-ascii" | "ascii" => text
            .chars()
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
            .collect(),
        _ => text.as_bytes().to_vec(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_wrapped_lines() {
        let data = vec![0xABu8; 200];
        let encoded = encode_base64_wrapped(&data);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= 76);
        }
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable(b"Hello, World!"), "Hello, World!");

        let encoded = encode_quoted_printable("Héllo".as_bytes());
        assert_eq!(encoded, "H=C3=A9llo");

        assert_eq!(encode_quoted_printable(b"a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_trailing_space() {
        assert_eq!(encode_quoted_printable(b"end \r\nnext "), "end=20\r\nnext=20");
    }

    #[test]
    fn test_quoted_printable_soft_wrap() {
        let data = vec![b'x'; 200];
        let encoded = encode_quoted_printable(&data);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= 76);
        }
        assert_eq!(decode_quoted_printable(encoded.as_bytes()), data);
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"broken=ZZ"), b"broken=ZZ");
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello"), "Hello");

        let encoded = encode_rfc2047("Héllo");
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert!(encoded.ends_with("?="));
        assert_eq!(decode_rfc2047(&encoded), "Héllo");
    }

    #[test]
    fn test_rfc2047_long_value_folds() {
        let subject = "Ünïcödé ".repeat(20);
        let encoded = encode_rfc2047(&subject);
        assert!(encoded.contains("\r\n "));
        let unfolded = encoded.replace("\r\n", "");
        assert_eq!(decode_rfc2047(&unfolded), subject);
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?="), "Héllo there");
        assert_eq!(decode_rfc2047("=?ISO-8859-1?Q?Andr=E9?= Pirard"), "André Pirard");
    }

    #[test]
    fn test_rfc2047_adjacent_words() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?a?= =?utf-8?Q?b?="), "ab");
        assert_eq!(decode_rfc2047("x =?utf-8?Q?a?= y"), "x a y");
    }

    #[test]
    fn test_rfc2047_invalid_word_kept() {
        assert_eq!(decode_rfc2047("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_rfc2047("2 =? 3"), "2 =? 3");
    }

    #[test]
    fn test_charsets() {
        assert_eq!(decode_charset(&[0x63, 0x61, 0x66, 0xE9], "ISO-8859-1"), "café");
        assert_eq!(encode_charset("café", "iso-8859-1"), vec![0x63, 0x61, 0x66, 0xE9]);
        assert_eq!(encode_charset("café", "us-ascii"), b"caf?");
        assert_eq!(decode_charset("café".as_bytes(), "utf-8"), "café");
    }

    #[test]
    fn test_windows_1252_high_range() {
        let bytes = [0x80, b' ', 0x93, b'h', b'i', 0x94, b' ', 0x97, b' ', 0xE9];
        let text = decode_charset(&bytes, "Windows-1252");
        assert_eq!(text, "\u{20AC} \u{201C}hi\u{201D} \u{2014} \u{E9}");
        assert_eq!(decode_charset(&[0x80], "iso-8859-1"), "\u{80}");
        assert_eq!(decode_charset(&[0x81, 0x9D], "cp1252"), "\u{81}\u{9D}");

        assert_eq!(encode_charset(&text, "windows-1252"), bytes);
        assert_eq!(encode_charset("\u{0100}", "cp1252"), b"?");
    }

    #[test]
    fn test_rfc2047_windows_1252_word() {
        assert_eq!(decode_rfc2047("=?windows-1252?Q?=93quoted=94?="), "\u{201C}quoted\u{201D}");
    }
}
