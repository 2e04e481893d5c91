//! SMTP session with type-state pattern.

mod client;

pub use client::{Authenticated, Connected, SessionState, SmtpClient};

use std::collections::BTreeSet;

use crate::types::AuthMechanism;

/// Server capabilities from the EHLO response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server hostname from the EHLO greeting line.
    pub hostname: String,
    /// Text of every EHLO line after the first, e.g. `STARTTLS`,
    /// `AUTH PLAIN LOGIN`, `SIZE 35882577`.
    pub capabilities: BTreeSet<String>,
}

impl ServerInfo {
    /// Builds the table from EHLO reply lines (prefixes already removed).
    #[must_use]
    pub fn from_ehlo(lines: &[String]) -> Self {
        let hostname = lines
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        let capabilities = lines
            .iter()
            .skip(1)
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self {
            hostname,
            capabilities,
        }
    }

    /// Returns the capability line whose keyword is `keyword`.
    #[must_use]
    pub fn capability(&self, keyword: &str) -> Option<&str> {
        self.capabilities
            .iter()
            .find(|line| {
                line.split_whitespace()
                    .next()
                    .is_some_and(|word| word.eq_ignore_ascii_case(keyword))
            })
            .map(String::as_str)
    }

    /// Checks if the server advertised an extension keyword.
    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.capability(keyword).is_some()
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports("STARTTLS")
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.capability("SIZE")?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
            .filter(|&size| size > 0)
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.capability("AUTH")
            .map(|line| {
                line.split_whitespace()
                    .skip(1)
                    .filter_map(AuthMechanism::parse)
                    .collect()
            })
            .unwrap_or_default()
    }
}
