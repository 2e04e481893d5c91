//! The message part tree.
//!
//! A message is a rooted tree of [`MessagePart`]s. Only
//! [`MessagePart::Multipart`] nodes have children. Content bytes are kept
//! apart from the structure in [`PartContents`], keyed by [`PartId`], so
//! IMAP can fetch the structure first and individual sections later.

use std::collections::HashMap;
use std::fmt;

use crate::transfer::TransferEncoding;

/// Identity of a part within one message.
///
/// Uses IMAP section numbering: children of the root multipart are `1`,
/// `2`, ...; nested parts are `2.1`, `2.2`, ...; a message that is not
/// multipart has a single part `1`. The root multipart itself has the
/// empty id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PartId(String);

impl PartId {
    /// The id of a root multipart.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Creates an id from a section string such as `1.2`.
    #[must_use]
    pub fn new(section: impl Into<String>) -> Self {
        Self(section.into())
    }

    /// The id of the `index`-th child (1-based).
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        if self.0.is_empty() {
            Self(index.to_string())
        } else {
            Self(format!("{}.{index}", self.0))
        }
    }

    /// The IMAP section string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the root multipart id.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subtype of a multipart container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MultipartKind {
    /// `multipart/mixed`: independent parts, usually body plus attachments.
    Mixed,
    /// `multipart/alternative`: the same content in several formats.
    Alternative,
    /// `multipart/related`: a root part plus resources it references.
    Related,
    /// Any other multipart subtype, kept verbatim (lowercase).
    Other(String),
}

impl MultipartKind {
    /// Maps a MIME subtype to a kind.
    #[must_use]
    pub fn from_subtype(subtype: &str) -> Self {
        match subtype.to_ascii_lowercase().as_str() {
            "mixed" => Self::Mixed,
            "alternative" => Self::Alternative,
            "related" => Self::Related,
            other => Self::Other(other.to_string()),
        }
    }

    /// The MIME subtype.
    #[must_use]
    pub fn subtype(&self) -> &str {
        match self {
            Self::Mixed => "mixed",
            Self::Alternative => "alternative",
            Self::Related => "related",
            Self::Other(subtype) => subtype,
        }
    }
}

/// A container part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    /// Part identity.
    pub id: PartId,
    kind: MultipartKind,
    /// Child parts, in wire order.
    pub children: Vec<MessagePart>,
}

impl Multipart {
    /// Creates an empty container. The kind cannot change afterwards.
    #[must_use]
    pub const fn new(id: PartId, kind: MultipartKind) -> Self {
        Self {
            id,
            kind,
            children: Vec::new(),
        }
    }

    /// Adds a child and returns the container.
    #[must_use]
    pub fn with_child(mut self, child: MessagePart) -> Self {
        self.children.push(child);
        self
    }

    /// The multipart subtype.
    #[must_use]
    pub const fn kind(&self) -> &MultipartKind {
        &self.kind
    }
}

/// A `text/*` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPart {
    /// Part identity.
    pub id: PartId,
    /// Text subtype, e.g. `plain` or `html`.
    pub subtype: String,
    /// Charset the content bytes are in.
    pub charset: String,
    /// Transfer encoding on the wire.
    pub encoding: TransferEncoding,
    /// Encoded size in bytes, when known.
    pub size: usize,
    /// Attachment filename, if the part is an attached text file.
    pub filename: Option<String>,
}

impl TextPart {
    /// Creates a text part with the transfer encoding its charset implies.
    #[must_use]
    pub fn new(id: PartId, subtype: impl Into<String>, charset: impl Into<String>) -> Self {
        let charset = charset.into();
        Self {
            id,
            subtype: subtype.into().to_ascii_lowercase(),
            encoding: TransferEncoding::for_charset(&charset),
            charset,
            size: 0,
            filename: None,
        }
    }
}

/// An image, application, audio or video part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPart {
    /// Part identity.
    pub id: PartId,
    /// MIME subtype, e.g. `png` or `pdf`.
    pub subtype: String,
    /// Transfer encoding on the wire.
    pub encoding: TransferEncoding,
    /// Encoded size in bytes, when known.
    pub size: usize,
    /// Attachment filename.
    pub filename: Option<String>,
}

impl BinaryPart {
    /// Creates a base64-encoded binary part.
    #[must_use]
    pub fn new(id: PartId, subtype: impl Into<String>) -> Self {
        Self {
            id,
            subtype: subtype.into().to_ascii_lowercase(),
            encoding: TransferEncoding::Base64,
            size: 0,
            filename: None,
        }
    }

    /// Sets the attachment filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// A part whose media type the client does not handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedPart {
    /// Part identity.
    pub id: PartId,
    /// Main media type, e.g. `model`.
    pub media_type: String,
    /// MIME subtype.
    pub subtype: String,
    /// Transfer encoding on the wire.
    pub encoding: TransferEncoding,
    /// Encoded size in bytes, when known.
    pub size: usize,
}

/// One node of a message's part tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    /// Container with children.
    Multipart(Multipart),
    /// `text/*`.
    Text(TextPart),
    /// `image/*`.
    Image(BinaryPart),
    /// `application/*` (and `message/*`, treated as an attachment).
    Application(BinaryPart),
    /// `audio/*`.
    Audio(BinaryPart),
    /// `video/*`.
    Video(BinaryPart),
    /// Anything else.
    Unsupported(UnsupportedPart),
}

impl MessagePart {
    /// Builds a leaf part from its media type.
    ///
    /// `multipart/*` is not a leaf and yields an empty container; callers
    /// that know the children should use [`Multipart`] directly.
    #[must_use]
    pub fn leaf(
        id: PartId,
        media_type: &str,
        subtype: &str,
        charset: Option<&str>,
        encoding: TransferEncoding,
        size: usize,
    ) -> Self {
        let subtype = subtype.to_ascii_lowercase();
        let binary = |id| BinaryPart {
            id,
            subtype: subtype.clone(),
            encoding,
            size,
            filename: None,
        };

        match media_type.to_ascii_lowercase().as_str() {
            "text" => Self::Text(TextPart {
                id,
                subtype: subtype.clone(),
                charset: charset.unwrap_or("us-ascii").to_string(),
                encoding,
                size,
                filename: None,
            }),
            "image" => Self::Image(binary(id)),
            "application" | "message" => Self::Application(binary(id)),
            "audio" => Self::Audio(binary(id)),
            "video" => Self::Video(binary(id)),
            "multipart" => Self::Multipart(Multipart::new(id, MultipartKind::from_subtype(&subtype))),
            other => Self::Unsupported(UnsupportedPart {
                id,
                media_type: other.to_string(),
                subtype,
                encoding,
                size,
            }),
        }
    }

    /// The part's identity.
    #[must_use]
    pub const fn id(&self) -> &PartId {
        match self {
            Self::Multipart(p) => &p.id,
            Self::Text(p) => &p.id,
            Self::Image(p) | Self::Application(p) | Self::Audio(p) | Self::Video(p) => &p.id,
            Self::Unsupported(p) => &p.id,
        }
    }

    /// Main media type (`multipart`, `text`, `image`, ...).
    #[must_use]
    pub fn media_type(&self) -> &str {
        match self {
            Self::Multipart(_) => "multipart",
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Application(_) => "application",
            Self::Audio(_) => "audio",
            Self::Video(_) => "video",
            Self::Unsupported(p) => &p.media_type,
        }
    }

    /// MIME subtype.
    #[must_use]
    pub fn subtype(&self) -> &str {
        match self {
            Self::Multipart(p) => p.kind.subtype(),
            Self::Text(p) => &p.subtype,
            Self::Image(p) | Self::Application(p) | Self::Audio(p) | Self::Video(p) => &p.subtype,
            Self::Unsupported(p) => &p.subtype,
        }
    }

    /// Transfer encoding of a leaf; containers report 7bit.
    #[must_use]
    pub const fn encoding(&self) -> TransferEncoding {
        match self {
            Self::Multipart(_) => TransferEncoding::SevenBit,
            Self::Text(p) => p.encoding,
            Self::Image(p) | Self::Application(p) | Self::Audio(p) | Self::Video(p) => p.encoding,
            Self::Unsupported(p) => p.encoding,
        }
    }

    /// Encoded size of a leaf as reported by the server or parser.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Multipart(p) => p.children.iter().map(Self::size).sum(),
            Self::Text(p) => p.size,
            Self::Image(p) | Self::Application(p) | Self::Audio(p) | Self::Video(p) => p.size,
            Self::Unsupported(p) => p.size,
        }
    }

    /// Child parts; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Multipart(p) => &p.children,
            Self::Text(_)
            | Self::Image(_)
            | Self::Application(_)
            | Self::Audio(_)
            | Self::Video(_)
            | Self::Unsupported(_) => &[],
        }
    }

    /// Visits this part and all descendants depth-first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Finds the part with the given id.
    #[must_use]
    pub fn find(&self, id: &PartId) -> Option<&Self> {
        if self.id() == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    /// Ids of every leaf, depth-first.
    #[must_use]
    pub fn leaf_ids(&self) -> Vec<PartId> {
        let mut ids = Vec::new();
        self.walk(&mut |part| {
            if !matches!(part, Self::Multipart(_)) {
                ids.push(part.id().clone());
            }
        });
        ids
    }

    /// Reassigns IMAP-style section ids to this tree as a message root.
    #[must_use]
    pub fn with_section_ids(self) -> Self {
        match self {
            Self::Multipart(_) => self.renumber(PartId::root()),
            leaf => leaf.renumber(PartId::root().child(1)),
        }
    }

    fn renumber(self, id: PartId) -> Self {
        match self {
            Self::Multipart(p) => {
                let children = p
                    .children
                    .into_iter()
                    .enumerate()
                    .map(|(i, child)| child.renumber(id.child(i + 1)))
                    .collect();
                Self::Multipart(Multipart {
                    id,
                    kind: p.kind,
                    children,
                })
            }
            Self::Text(p) => Self::Text(TextPart { id, ..p }),
            Self::Image(p) => Self::Image(BinaryPart { id, ..p }),
            Self::Application(p) => Self::Application(BinaryPart { id, ..p }),
            Self::Audio(p) => Self::Audio(BinaryPart { id, ..p }),
            Self::Video(p) => Self::Video(BinaryPart { id, ..p }),
            Self::Unsupported(p) => Self::Unsupported(UnsupportedPart { id, ..p }),
        }
    }
}

/// Decoded content of the parts of one message, keyed by part id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartContents {
    contents: HashMap<PartId, Vec<u8>>,
}

impl PartContents {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores content for a part, replacing any previous content.
    pub fn insert(&mut self, id: PartId, content: Vec<u8>) {
        self.contents.insert(id, content);
    }

    /// Content of a part, if it has been retrieved.
    #[must_use]
    pub fn get(&self, id: &PartId) -> Option<&[u8]> {
        self.contents.get(id).map(Vec::as_slice)
    }

    /// Returns true if content for the part is present.
    #[must_use]
    pub fn contains(&self, id: &PartId) -> bool {
        self.contents.contains_key(id)
    }

    /// Number of parts with content.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Returns true if no content has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}
