//! Connection configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Security {
    /// No encryption. **Not recommended.**
    None,
    /// Start with plaintext, upgrade with STARTTLS/STLS.
    StartTls,
    /// TLS from the start. **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns true if the socket is wrapped in TLS before any data is exchanged.
    #[must_use]
    pub const fn is_implicit(self) -> bool {
        matches!(self, Self::Implicit)
    }
}

/// Where and how to open a line connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl ConnectOptions {
    /// Creates options with a 30 second connect timeout.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, security: Security) -> Self {
        Self {
            host: host.into(),
            port,
            security,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
