//! SASL mechanisms the client can run.

use serde::{Deserialize, Serialize};

/// A SASL mechanism for `AUTH`.
///
/// Serialized in kebab case (`"cram-md5"`) so settings files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMechanism {
    /// `PLAIN` (RFC 4616): one response carrying both secrets.
    #[default]
    Plain,
    /// `LOGIN`: username and password as two separate responses.
    Login,
    /// `CRAM-MD5` (RFC 2195): HMAC-MD5 over the server's challenge.
    CramMd5,
}

impl AuthMechanism {
    /// Every supported mechanism.
    pub const ALL: [Self; 3] = [Self::Plain, Self::Login, Self::CramMd5];

    /// Looks up a mechanism name from an EHLO `AUTH` line.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mechanism| mechanism.as_str().eq_ignore_ascii_case(name))
    }

    /// Name as sent after `AUTH`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
        }
    }
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
