//! Reply and forward helpers.

use crate::encoding::decode_charset;
use crate::envelope::Envelope;
use crate::part::{MessagePart, Multipart, MultipartKind, PartContents, TextPart};

/// Picks the text part a reader would see first.
///
/// Alternatives prefer `text/plain`; other containers take their first
/// part that has text.
#[must_use]
pub fn primary_text(part: &MessagePart) -> Option<&TextPart> {
    match part {
        MessagePart::Text(text) => Some(text),
        MessagePart::Multipart(multipart) => match multipart.kind() {
            MultipartKind::Alternative => multipart
                .children
                .iter()
                .find_map(|child| match child {
                    MessagePart::Text(text) if text.subtype == "plain" => Some(text),
                    _ => None,
                })
                .or_else(|| multipart.children.iter().find_map(primary_text)),
            MultipartKind::Mixed | MultipartKind::Related | MultipartKind::Other(_) => {
                multipart.children.iter().find_map(primary_text)
            }
        },
        MessagePart::Image(_)
        | MessagePart::Application(_)
        | MessagePart::Audio(_)
        | MessagePart::Video(_)
        | MessagePart::Unsupported(_) => None,
    }
}

/// Builds the quoted body of a reply.
///
/// The primary text is decoded from its charset and every line prefixed
/// with `> `, under an attribution line. Returns just the attribution if
/// the message has no text content.
#[must_use]
pub fn reply_text(envelope: &Envelope, root: &MessagePart, contents: &PartContents) -> String {
    let mut reply = format!(
        "On {}, {} wrote:\r\n",
        envelope.date.format("%a, %d %b %Y %H:%M"),
        envelope.first_from()
    );

    let Some(text) = primary_text(root) else {
        return reply;
    };
    let Some(content) = contents.get(&text.id) else {
        return reply;
    };

    let decoded = decode_charset(content, &text.charset);
    for line in decoded.trim_end().lines() {
        reply.push('>');
        if !line.is_empty() {
            reply.push(' ');
        }
        reply.push_str(line);
        reply.push_str("\r\n");
    }
    reply
}

/// Envelope for a reply: addressed to Reply-To (or From), `Re:` subject,
/// threaded with In-Reply-To.
#[must_use]
pub fn reply_envelope(original: &Envelope, from: &str) -> Envelope {
    let to = if original.reply_to.is_empty() {
        original.from.clone()
    } else {
        original.reply_to.clone()
    };

    Envelope {
        subject: prefixed_subject("Re:", &original.subject),
        from: vec![from.to_string()],
        to,
        in_reply_to: original.message_id.clone(),
        ..Envelope::default()
    }
}

/// Envelope for forwarding: `Fwd:` subject, recipients left empty.
#[must_use]
pub fn forward_envelope(original: &Envelope, from: &str) -> Envelope {
    Envelope {
        subject: prefixed_subject("Fwd:", &original.subject),
        from: vec![from.to_string()],
        ..Envelope::default()
    }
}

fn prefixed_subject(prefix: &str, subject: &str) -> String {
    let already = subject
        .get(..prefix.len())
        .is_some_and(|start| start.eq_ignore_ascii_case(prefix));
    if already {
        subject.to_string()
    } else {
        format!("{prefix} {subject}")
    }
}

/// Rebuilds a part tree for forwarding.
///
/// Alternatives collapse to their best text (plain preferred), mixed and
/// related containers keep their attachments, unsupported parts are
/// dropped. Part ids are preserved so the original [`PartContents`] still
/// applies. Returns `None` if nothing forwardable remains.
#[must_use]
pub fn forward_part(part: &MessagePart) -> Option<MessagePart> {
    match part {
        MessagePart::Multipart(multipart) => match multipart.kind() {
            MultipartKind::Alternative => primary_text(part)
                .map(|text| MessagePart::Text(text.clone()))
                .or_else(|| multipart.children.iter().find_map(forward_part)),
            MultipartKind::Mixed | MultipartKind::Related | MultipartKind::Other(_) => {
                let children: Vec<MessagePart> =
                    multipart.children.iter().filter_map(forward_part).collect();
                if children.is_empty() {
                    return None;
                }
                let mut rebuilt = Multipart::new(multipart.id.clone(), multipart.kind().clone());
                rebuilt.children = children;
                Some(MessagePart::Multipart(rebuilt))
            }
        },
        MessagePart::Text(_)
        | MessagePart::Image(_)
        | MessagePart::Application(_)
        | MessagePart::Audio(_)
        | MessagePart::Video(_) => Some(part.clone()),
        MessagePart::Unsupported(_) => None,
    }
}
