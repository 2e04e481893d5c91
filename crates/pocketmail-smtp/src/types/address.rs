//! Envelope addresses for MAIL FROM and RCPT TO.

use crate::error::{Error, Result};

/// Bare `local@domain` address for the SMTP envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates an address, stripping a display-name wrapper first.
    ///
    /// `"Ann Smith" <ann@example.com>` and `ann@example.com` both yield
    /// `ann@example.com`.
    ///
    /// # Errors
    ///
    /// Returns an error if what remains is not `local@domain`.
    pub fn new(addr: impl AsRef<str>) -> Result<Self> {
        let addr = strip_display_name(addr.as_ref());
        Self::validate(addr)?;
        Ok(Self(addr.to_string()))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }
        if addr.chars().any(|c| c.is_whitespace() || c == '<' || c == '>') {
            return Err(Error::InvalidAddress(format!("Unexpected characters in {addr}")));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress("Address must contain @".into()));
        };
        if domain.contains('@') {
            return Err(Error::InvalidAddress(
                "Address must have exactly one @".into(),
            ));
        }
        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

/// `Name <addr>` → `addr`; anything else is trimmed.
fn strip_display_name(addr: &str) -> &str {
    let addr = addr.trim();
    match (addr.rfind('<'), addr.rfind('>')) {
        (Some(open), Some(close)) if open < close => addr[open + 1..close].trim(),
        _ => addr,
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
