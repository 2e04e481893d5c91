//! Generic IMAP data values.
//!
//! Server data such as ENVELOPE, BODYSTRUCTURE or a LIST reply is a tree
//! of atoms, quoted strings, literals, `NIL` and parenthesized lists. This
//! module parses that tree by recursive descent; the mapping to typed
//! structures lives next to it.

use std::borrow::Cow;

use crate::{Error, Result};

/// Nesting limit for parenthesized lists.
const MAX_DEPTH: usize = 64;

/// One IMAP data value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `NIL`.
    Nil,
    /// Bare atom, including numbers and flags.
    Atom(String),
    /// Quoted string with escapes removed.
    Quoted(String),
    /// Literal bytes from `{n}`.
    Literal(Vec<u8>),
    /// Parenthesized list.
    List(Vec<Value>),
}

impl Value {
    /// Returns the value as text. `NIL` and lists have none.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Atom(s) | Self::Quoted(s) => Some(Cow::Borrowed(s)),
            Self::Literal(bytes) => Some(String::from_utf8_lossy(bytes)),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Returns the raw bytes of a string value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Atom(s) | Self::Quoted(s) => Some(s.as_bytes()),
            Self::Literal(bytes) => Some(bytes),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Returns the elements of a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Parses an atom or string as a number.
    #[must_use]
    pub fn as_number(&self) -> Option<u32> {
        self.as_text()?.trim().parse().ok()
    }

    /// Returns true for `NIL`.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

/// Recursive-descent parser over one logical response.
///
/// Literal data must follow its `{n}` announcement after a line break, the
/// way the client assembles responses.
#[derive(Debug)]
pub struct ValueParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> ValueParser<'a> {
    /// Creates a parser positioned at the start of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Creates a parser positioned at `pos`.
    #[must_use]
    pub const fn at(input: &'a [u8], pos: usize) -> Self {
        Self { input, pos }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns true once only whitespace remains.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.input[self.pos.min(self.input.len())..]
            .iter()
            .all(u8::is_ascii_whitespace)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(self.pos, message)
    }

    /// Skips spaces (and line breaks, which only occur around literals).
    pub fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// Parses the next value.
    pub fn parse_value(&mut self) -> Result<Value> {
        self.value(0)
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'(') => self.list(depth),
            Some(b'"') => self.quoted(),
            Some(b'{') => self.literal(),
            Some(b')') => Err(self.error("unexpected ')'")),
            Some(_) => self.atom(),
        }
    }

    fn list(&mut self, depth: usize) -> Result<Value> {
        if depth >= MAX_DEPTH {
            return Err(self.error("lists nested too deeply"));
        }
        self.pos += 1;

        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("unterminated list")),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                Some(_) => items.push(self.value(depth + 1)?),
            }
        }
    }

    fn quoted(&mut self) -> Result<Value> {
        self.pos += 1;
        let mut bytes = Vec::new();

        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted string")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(Value::Quoted(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.error("unterminated quoted string"))?;
                    bytes.push(escaped);
                    self.pos += 1;
                }
                Some(b) => {
                    bytes.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn literal(&mut self) -> Result<Value> {
        let start = self.pos;
        let close = self.input[start..]
            .iter()
            .position(|&b| b == b'}')
            .map(|offset| start + offset)
            .ok_or_else(|| self.error("unterminated literal length"))?;

        let digits = &self.input[start + 1..close];
        let digits = digits.strip_suffix(b"+").unwrap_or(digits);
        let len: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("invalid literal length"))?;

        self.pos = close + 1;
        if self.input[self.pos..].starts_with(b"\r\n") {
            self.pos += 2;
        } else if self.peek() == Some(b'\n') {
            self.pos += 1;
        } else {
            return Err(self.error("literal length not followed by line break"));
        }

        let end = self.pos + len;
        if end > self.input.len() {
            return Err(self.error(format!("literal of {len} bytes is truncated")));
        }
        let data = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(Value::Literal(data))
    }

    fn atom(&mut self) -> Result<Value> {
        let start = self.pos;

        while let Some(b) = self.peek() {
            match b {
                b' ' | b'(' | b')' | b'"' | b'{' | b'\r' | b'\n' => break,
                b'[' => {
                    // BODY[HEADER.FIELDS (FROM)] keeps its bracketed section whole.
                    let close = self.input[self.pos..]
                        .iter()
                        .position(|&c| c == b']')
                        .ok_or_else(|| self.error("unterminated section"))?;
                    self.pos += close + 1;
                }
                _ => self.pos += 1,
            }
        }

        if self.pos == start {
            return Err(self.error("expected value"));
        }

        let atom = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        if atom.eq_ignore_ascii_case("NIL") {
            Ok(Value::Nil)
        } else {
            Ok(Value::Atom(atom))
        }
    }
}

/// Parses exactly one value; anything but whitespace after it is an error.
pub fn parse_value(input: &[u8]) -> Result<Value> {
    let mut parser = ValueParser::new(input);
    let value = parser.parse_value()?;
    if !parser.at_end() {
        return Err(Error::parse(parser.position(), "trailing data after value"));
    }
    Ok(value)
}
