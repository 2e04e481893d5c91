//! Content-Transfer-Encoding handling.

use std::fmt;

use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::Result;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses a transfer encoding name, case-insensitively.
    ///
    /// Unknown names fall back to 7bit, which leaves content untouched.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }

    /// Encoding used when writing text in `charset`.
    ///
    /// US-ASCII goes out as 7bit, ISO-8859-1 as quoted-printable and any
    /// other charset as base64.
    #[must_use]
    pub fn for_charset(charset: &str) -> Self {
        match charset.trim().to_ascii_lowercase().as_str() {
            "us-ascii" | "ascii" => Self::SevenBit,
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Self::QuotedPrintable,
            _ => Self::Base64,
        }
    }

    /// Decodes transfer-encoded content.
    ///
    /// # Errors
    ///
    /// Returns an error if base64 content is malformed.
    pub fn decode(self, raw: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(&String::from_utf8_lossy(raw)),
            Self::QuotedPrintable => Ok(decode_quoted_printable(raw)),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(raw.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse(" Quoted-Printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_for_charset() {
        assert_eq!(TransferEncoding::for_charset("US-ASCII"), TransferEncoding::SevenBit);
        assert_eq!(
            TransferEncoding::for_charset("iso-8859-1"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::for_charset("UTF-8"), TransferEncoding::Base64);
        assert_eq!(TransferEncoding::for_charset("koi8-r"), TransferEncoding::Base64);
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            TransferEncoding::Base64.decode(b"aGVs\r\nbG8=").unwrap(),
            b"hello"
        );
        assert_eq!(
            TransferEncoding::QuotedPrintable.decode(b"caf=E9").unwrap(),
            vec![b'c', b'a', b'f', 0xE9]
        );
        assert_eq!(TransferEncoding::SevenBit.decode(b"as is").unwrap(), b"as is");
        assert!(TransferEncoding::Base64.decode(b"!!!").is_err());
    }
}
