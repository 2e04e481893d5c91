//! Parsing raw RFC 822 / MIME messages into a part tree.

use tracing::{debug, warn};

use crate::content_type::{ContentType, split_parameters, unquote};
use crate::encoding::decode_rfc2047;
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::header::{Headers, split_header_block};
use crate::part::{MessagePart, Multipart, MultipartKind, PartContents, PartId};
use crate::transfer::TransferEncoding;

/// Deepest multipart nesting accepted.
const MAX_DEPTH: usize = 32;

/// A message parsed from its raw bytes.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    /// Top-level headers.
    pub headers: Headers,
    /// Envelope built from the headers.
    pub envelope: Envelope,
    /// Part tree with IMAP-style section ids.
    pub root: MessagePart,
    /// Decoded content of every leaf.
    pub contents: PartContents,
    /// True if the input was cut at the size limit before parsing.
    pub truncated: bool,
}

/// Parses a raw message.
///
/// Input longer than `max_size` is cut before parsing and the result is
/// marked truncated; a multipart whose closing boundary was cut off keeps
/// the parts seen so far. Content that fails transfer decoding is kept
/// raw.
///
/// # Errors
///
/// Returns an error if a multipart has no boundary parameter or nesting
/// is deeper than the parser accepts.
pub fn parse_message(raw: &[u8], max_size: Option<usize>) -> Result<ParsedMessage> {
    let (raw, truncated) = match max_size {
        Some(max) if raw.len() > max => {
            debug!(size = raw.len(), max, "truncating message before parsing");
            (&raw[..max], true)
        }
        _ => (raw, false),
    };

    let (header_block, body) = split_header_block(raw);
    let headers = Headers::parse_bytes(header_block);
    let envelope = Envelope::from_headers(&headers);

    let content_type = content_type_of(&headers);
    let root_id = if content_type.is_multipart() {
        PartId::root()
    } else {
        PartId::root().child(1)
    };

    let mut contents = PartContents::new();
    let root = parse_entity(&headers, body, root_id, &mut contents, 0)?;

    Ok(ParsedMessage {
        headers,
        envelope,
        root,
        contents,
        truncated,
    })
}

/// Parses only the header block of a message into an envelope.
///
/// Used for POP3 `TOP n 0` replies.
#[must_use]
pub fn parse_envelope(raw: &[u8]) -> Envelope {
    let (header_block, _) = split_header_block(raw);
    Envelope::from_headers(&Headers::parse_bytes(header_block))
}

fn content_type_of(headers: &Headers) -> ContentType {
    headers
        .get("content-type")
        .and_then(|value| match ContentType::parse(value) {
            Ok(ct) => Some(ct),
            Err(e) => {
                debug!(error = %e, "malformed content type, assuming text/plain");
                None
            }
        })
        .unwrap_or_default()
}

fn parse_entity(
    headers: &Headers,
    body: &[u8],
    id: PartId,
    contents: &mut PartContents,
    depth: usize,
) -> Result<MessagePart> {
    if depth > MAX_DEPTH {
        return Err(Error::TooDeep(MAX_DEPTH));
    }

    let content_type = content_type_of(headers);

    if content_type.is_multipart() {
        let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
        let mut multipart = Multipart::new(id, MultipartKind::from_subtype(&content_type.sub_type));

        for (i, raw_part) in split_multipart(body, boundary).into_iter().enumerate() {
            let (header_block, part_body) = split_header_block(raw_part);
            let part_headers = Headers::parse_bytes(header_block);
            let child_id = multipart.id.child(i + 1);
            let child = parse_entity(&part_headers, part_body, child_id, contents, depth + 1)?;
            multipart.children.push(child);
        }

        return Ok(MessagePart::Multipart(multipart));
    }

    let encoding = headers
        .get("content-transfer-encoding")
        .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);

    let mut part = MessagePart::leaf(
        id,
        &content_type.main_type,
        &content_type.sub_type,
        content_type.charset(),
        encoding,
        body.len(),
    );

    let filename = disposition_filename(headers).or_else(|| content_type.name().map(decode_rfc2047));
    match &mut part {
        MessagePart::Text(text) => text.filename = filename,
        MessagePart::Image(binary)
        | MessagePart::Application(binary)
        | MessagePart::Audio(binary)
        | MessagePart::Video(binary) => binary.filename = filename,
        MessagePart::Multipart(_) | MessagePart::Unsupported(_) => {}
    }

    let decoded = encoding.decode(body).unwrap_or_else(|e| {
        warn!(part = %part.id(), error = %e, "transfer decoding failed, keeping raw content");
        body.to_vec()
    });
    contents.insert(part.id().clone(), decoded);

    Ok(part)
}

fn disposition_filename(headers: &Headers) -> Option<String> {
    let disposition = headers.get("content-disposition")?;
    split_parameters(disposition)
        .into_iter()
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("filename"))
        .map(|(_, value)| decode_rfc2047(&unquote(value.trim())))
}

/// Splits a multipart body into the raw bytes of each part.
///
/// The preamble and epilogue are dropped, as is the line break before
/// each delimiter line. If the closing delimiter is missing the last part
/// runs to the end of the body.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let next = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i + 1);
        let line = trim_line_end(&body[pos..next]);

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest.starts_with(b"--");
            let tail = if closing { &rest[2..] } else { rest };

            if tail.iter().all(u8::is_ascii_whitespace) {
                if let Some(start) = part_start {
                    parts.push(&body[start..strip_break_before(body, start, pos)]);
                }
                if closing {
                    return parts;
                }
                part_start = Some(next);
            }
        }

        pos = next;
    }

    if let Some(start) = part_start {
        debug!("multipart closing delimiter missing");
        parts.push(&body[start.min(body.len())..]);
    }
    parts
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// End of a part's content: `pos` minus the CRLF or LF just before it.
fn strip_break_before(body: &[u8], start: usize, pos: usize) -> usize {
    let mut end = pos;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MULTIPART: &[u8] = b"From: Ann <ann@example.com>\r\n\
Subject: Photos\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
This is the preamble.\r\n\
--XYZ\r\n\
Content-Type: multipart/alternative; boundary=ALT\r\n\
\r\n\
--ALT\r\n\
Content-Type: text/plain; charset=ISO-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Voil=E0\r\n\
--ALT\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Voil\xC3\xA0</p>\r\n\
--ALT--\r\n\
\r\n\
--XYZ\r\n\
Content-Type: image/png\r\n\
Content-Transfer-Encoding: base64\r\n\
Content-Disposition: attachment; filename=\"dot.png\"\r\n\
\r\n\
iVBO\r\n\
Rw==\r\n\
--XYZ--\r\n\
epilogue\r\n";

    #[test]
    fn test_parse_nested_multipart() {
        let parsed = parse_message(MULTIPART, None).unwrap();
        assert_eq!(parsed.envelope.subject, "Photos");
        assert!(!parsed.truncated);

        let MessagePart::Multipart(root) = &parsed.root else {
            panic!("expected multipart root");
        };
        assert_eq!(root.kind(), &MultipartKind::Mixed);
        assert_eq!(root.children.len(), 2);

        let ids: Vec<String> = parsed.root.leaf_ids().iter().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["1.1", "1.2", "2"]);

        let plain = parsed.root.find(&PartId::new("1.1")).unwrap();
        let MessagePart::Text(plain) = plain else {
            panic!("expected text part");
        };
        assert_eq!(plain.charset, "ISO-8859-1");
        assert_eq!(plain.encoding, TransferEncoding::QuotedPrintable);
        assert_eq!(parsed.contents.get(&plain.id), Some(&b"Voil\xE0"[..]));

        assert_eq!(
            parsed.contents.get(&PartId::new("1.2")),
            Some("<p>Voilà</p>".as_bytes())
        );

        let MessagePart::Image(image) = parsed.root.find(&PartId::new("2")).unwrap() else {
            panic!("expected image part");
        };
        assert_eq!(image.filename.as_deref(), Some("dot.png"));
        assert_eq!(
            parsed.contents.get(&image.id),
            Some(&[0x89, 0x50, 0x4E, 0x47][..])
        );
    }

    #[test]
    fn test_parse_single_part() {
        let raw = b"Subject: hi\r\nContent-Type: text/plain\r\n\r\nline one\r\nline two\r\n";
        let parsed = parse_message(raw, None).unwrap();

        assert_eq!(parsed.root.id().as_str(), "1");
        let MessagePart::Text(text) = &parsed.root else {
            panic!("expected text");
        };
        assert_eq!(text.charset, "us-ascii");
        assert_eq!(
            parsed.contents.get(&text.id),
            Some(&b"line one\r\nline two\r\n"[..])
        );
    }

    #[test]
    fn test_parse_missing_content_type_defaults_to_text() {
        let parsed = parse_message(b"Subject: x\n\nbody", None).unwrap();
        assert!(matches!(parsed.root, MessagePart::Text(_)));
    }

    #[test]
    fn test_parse_missing_boundary_is_error() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nbody";
        assert!(matches!(parse_message(raw, None), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_truncated_multipart_keeps_parts() {
        let cut = MULTIPART.len() - 40;
        let parsed = parse_message(MULTIPART, Some(cut)).unwrap();
        assert!(parsed.truncated);
        assert_eq!(parsed.root.children().len(), 2);
    }

    #[test]
    fn test_bad_base64_kept_raw() {
        let raw = b"Content-Type: application/octet-stream\r\n\
Content-Transfer-Encoding: base64\r\n\r\n!!not base64!!";
        let parsed = parse_message(raw, None).unwrap();
        assert_eq!(
            parsed.contents.get(&PartId::new("1")),
            Some(&b"!!not base64!!"[..])
        );
    }

    #[test]
    fn test_parse_envelope_only() {
        let envelope = parse_envelope(b"From: a@b.c\r\nSubject: Hi\r\n\r\n");
        assert_eq!(envelope.subject, "Hi");
        assert_eq!(envelope.from, vec!["a@b.c"]);
    }

    #[test]
    fn test_split_multipart_empty_part() {
        let parts = split_multipart(b"--B\r\n--B\r\nx\r\n--B--\r\n", "B");
        assert_eq!(parts, vec![&b""[..], &b"x"[..]]);
    }
}
