//! Errors from structural message parsing.
//!
//! Header and envelope problems never show up here: those parsers fall
//! back to placeholders instead of failing.

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A message whose structure cannot be recovered.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `Content-Type` value without a usable `type/subtype`.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Base64 content that does not decode.
    #[error("Invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A multipart body whose `Content-Type` names no boundary.
    #[error("Multipart body without a boundary")]
    MissingBoundary,

    /// Multiparts nested past the supported depth.
    #[error("Multipart nesting deeper than {0}")]
    TooDeep(usize),
}
