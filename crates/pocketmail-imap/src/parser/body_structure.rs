//! BODYSTRUCTURE mapping onto the message part tree.

use pocketmail_mime::{MessagePart, Multipart, MultipartKind, PartId, TransferEncoding};
use tracing::warn;

use super::value::Value;
use crate::{Error, Result};

/// Nesting limit for multipart containers.
const MAX_DEPTH: usize = 32;

/// Builds a [`MessagePart`] tree from a BODYSTRUCTURE value.
///
/// Part ids are IMAP section numbers: the root multipart has the empty
/// id, its children `1`, `2`, ..., their children `1.1`, `1.2`, ... A
/// single-part message's body is section `1`.
pub fn part_from_body_structure(value: &Value) -> Result<MessagePart> {
    let items = value
        .as_list()
        .ok_or_else(|| Error::Malformed("BODYSTRUCTURE is not a list".to_string()))?;

    let id = if is_multipart(items) {
        PartId::root()
    } else {
        PartId::root().child(1)
    };
    build(items, id, 0)
}

fn is_multipart(items: &[Value]) -> bool {
    matches!(items.first(), Some(Value::List(_)))
}

fn build(items: &[Value], id: PartId, depth: usize) -> Result<MessagePart> {
    if depth > MAX_DEPTH {
        return Err(Error::Malformed("body structure nested too deeply".to_string()));
    }

    if is_multipart(items) {
        let mut children = Vec::new();
        let mut rest = items;
        while let Some((Value::List(child), tail)) = rest.split_first() {
            children.push(build(child, id.child(children.len() + 1), depth + 1)?);
            rest = tail;
        }

        let subtype = rest
            .first()
            .and_then(Value::as_text)
            .map_or_else(|| "mixed".to_string(), |s| s.to_ascii_lowercase());

        let mut multipart = Multipart::new(id, MultipartKind::from_subtype(&subtype));
        multipart.children = children;
        return Ok(MessagePart::Multipart(multipart));
    }

    leaf(items, id)
}

fn leaf(items: &[Value], id: PartId) -> Result<MessagePart> {
    if items.len() < 7 {
        return Err(Error::Malformed(format!(
            "body part {id} has {} fields, expected at least 7",
            items.len()
        )));
    }

    let text = |index: usize, what: &str| {
        items[index]
            .as_text()
            .ok_or_else(|| Error::Malformed(format!("body part {id} has no {what}")))
    };
    let media_type = text(0, "media type")?;
    let subtype = text(1, "subtype")?;
    let params = &items[2];
    let encoding = items[5]
        .as_text()
        .map_or(TransferEncoding::SevenBit, |e| TransferEncoding::parse(&e));
    let size = items[6]
        .as_number()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);

    let charset = parameter(params, "charset");
    let filename = disposition_filename(&items[7..]).or_else(|| parameter(params, "name"));

    let mut part = MessagePart::leaf(
        id,
        &media_type,
        &subtype,
        charset.as_deref(),
        encoding,
        size,
    );
    match &mut part {
        MessagePart::Text(text) => text.filename = filename,
        MessagePart::Image(binary)
        | MessagePart::Application(binary)
        | MessagePart::Audio(binary)
        | MessagePart::Video(binary) => binary.filename = filename,
        MessagePart::Multipart(_) | MessagePart::Unsupported(_) => {}
    }
    Ok(part)
}

/// Looks up a body parameter; keys match case-insensitively.
fn parameter(params: &Value, key: &str) -> Option<String> {
    params.as_list()?.chunks_exact(2).find_map(|pair| {
        let name = pair[0].as_text()?;
        if name.eq_ignore_ascii_case(key) {
            pair[1].as_text().map(std::borrow::Cow::into_owned)
        } else {
            None
        }
    })
}

/// Finds `("attachment" ("filename" "x"))` among extension data.
fn disposition_filename(extension: &[Value]) -> Option<String> {
    extension.iter().find_map(|item| {
        let [kind, params, ..] = item.as_list()? else {
            return None;
        };
        kind.as_text()?;
        parameter(params, "filename")
    })
}

/// Undoes the transfer encoding of fetched section content.
///
/// Content that fails to decode is returned as received.
#[must_use]
pub fn decode_section(part: &MessagePart, raw: &[u8]) -> Vec<u8> {
    part.encoding().decode(raw).unwrap_or_else(|e| {
        warn!(section = %part.id(), error = %e, "section failed to decode, keeping raw bytes");
        raw.to_vec()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::value::parse_value;

    #[test]
    fn test_single_text_part() {
        let value = parse_value(
            br#"("TEXT" "PLAIN" ("CHARSET" "ISO-8859-1") NIL NIL "QUOTED-PRINTABLE" 1315 42)"#,
        )
        .unwrap();
        let part = part_from_body_structure(&value).unwrap();

        let MessagePart::Text(text) = &part else {
            panic!("expected text part");
        };
        assert_eq!(text.id.as_str(), "1");
        assert_eq!(text.subtype, "plain");
        assert_eq!(text.charset, "ISO-8859-1");
        assert_eq!(text.encoding, TransferEncoding::QuotedPrintable);
        assert_eq!(text.size, 1315);
    }

    #[test]
    fn test_charset_key_case_insensitive() {
        let value =
            parse_value(br#"("text" "html" ("Charset" "utf-8") NIL NIL "base64" 10 1)"#).unwrap();
        let MessagePart::Text(text) = part_from_body_structure(&value).unwrap() else {
            panic!("expected text part");
        };
        assert_eq!(text.charset, "utf-8");
    }

    #[test]
    fn test_nested_multipart_ids() {
        let value = parse_value(
            br#"((("TEXT" "PLAIN" ("CHARSET" "US-ASCII") NIL NIL "7BIT" 10 1)("TEXT" "HTML" ("CHARSET" "UTF-8") NIL NIL "BASE64" 20 1) "ALTERNATIVE" ("BOUNDARY" "b2")) ("IMAGE" "PNG" ("NAME" "dot.png") "<cid>" NIL "BASE64" 300) ("APPLICATION" "PDF" NIL NIL NIL "BASE64" 4000 NIL ("ATTACHMENT" ("FILENAME" "report.pdf")) NIL) ("MODEL" "X3D" NIL NIL NIL "BASE64" 5) "MIXED" ("BOUNDARY" "b1") NIL NIL)"#,
        )
        .unwrap();
        let root = part_from_body_structure(&value).unwrap();

        let MessagePart::Multipart(mixed) = &root else {
            panic!("expected multipart");
        };
        assert!(mixed.id.is_root());
        assert_eq!(mixed.kind(), &MultipartKind::Mixed);
        assert_eq!(mixed.children.len(), 4);

        let alternative = &mixed.children[0];
        assert_eq!(alternative.id().as_str(), "1");
        assert_eq!(alternative.children().len(), 2);
        assert_eq!(alternative.children()[1].id().as_str(), "1.2");
        assert_eq!(alternative.children()[1].encoding(), TransferEncoding::Base64);

        let MessagePart::Image(image) = &mixed.children[1] else {
            panic!("expected image");
        };
        assert_eq!(image.id.as_str(), "2");
        assert_eq!(image.filename.as_deref(), Some("dot.png"));

        let MessagePart::Application(pdf) = &mixed.children[2] else {
            panic!("expected application");
        };
        assert_eq!(pdf.filename.as_deref(), Some("report.pdf"));

        assert!(matches!(&mixed.children[3], MessagePart::Unsupported(p) if p.media_type == "model"));
        assert_eq!(
            root.leaf_ids().iter().map(PartId::as_str).collect::<Vec<_>>(),
            vec!["1.1", "1.2", "2", "3", "4"]
        );
    }

    #[test]
    fn test_malformed_structures() {
        assert!(part_from_body_structure(&Value::Nil).is_err());
        let short = parse_value(br#"("TEXT" "PLAIN" NIL)"#).unwrap();
        assert!(part_from_body_structure(&short).is_err());
        let no_type = parse_value(br"(NIL NIL NIL NIL NIL NIL 0)").unwrap();
        assert!(part_from_body_structure(&no_type).is_err());
    }

    #[test]
    fn test_decode_section() {
        let value =
            parse_value(br#"("TEXT" "PLAIN" NIL NIL NIL "BASE64" 8)"#).unwrap();
        let part = part_from_body_structure(&value).unwrap();
        assert_eq!(decode_section(&part, b"aGVsbG8="), b"hello");
        assert_eq!(decode_section(&part, b"!!!"), b"!!!");
    }
}
