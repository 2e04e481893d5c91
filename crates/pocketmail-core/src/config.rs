//! Account and limit settings.
//!
//! Settings are plain values handed to the engine as a snapshot. Nothing
//! here is read from global state; a change reaches a running handler only
//! through [`ConnectionHandler::update_settings`](crate::ConnectionHandler::update_settings).

use std::time::Duration;

use pocketmail_net::{ConnectOptions, Security};
use pocketmail_smtp::AuthMechanism;
use serde::{Deserialize, Serialize};

/// Mail retrieval protocol of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    /// IMAP4rev1.
    #[default]
    Imap,
    /// POP3.
    Pop3,
}

impl ProtocolKind {
    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(self, security: Security) -> u16 {
        match (self, security) {
            (Self::Imap, Security::None | Security::StartTls) => 143,
            (Self::Imap, Security::Implicit) => 993,
            (Self::Pop3, Security::None | Security::StartTls) => 110,
            (Self::Pop3, Security::Implicit) => 995,
        }
    }
}

/// Username and password.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Incoming mail server of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Login credentials.
    pub credentials: Credentials,
    /// Retrieval protocol.
    pub protocol: ProtocolKind,
    /// Route the transport through the device's own network stack rather
    /// than a carrier proxy. Carried for the embedder; the engine always
    /// dials directly.
    #[serde(default)]
    pub device_routing: bool,
}

impl AccountConfig {
    /// Creates an IMAP account with implicit TLS on port 993.
    #[must_use]
    pub fn imap(host: impl Into<String>, credentials: Credentials) -> Self {
        Self::new(host, ProtocolKind::Imap, credentials)
    }

    /// Creates a POP3 account with implicit TLS on port 995.
    #[must_use]
    pub fn pop3(host: impl Into<String>, credentials: Credentials) -> Self {
        Self::new(host, ProtocolKind::Pop3, credentials)
    }

    fn new(host: impl Into<String>, protocol: ProtocolKind, credentials: Credentials) -> Self {
        let security = Security::default();
        Self {
            host: host.into(),
            port: protocol.default_port(security),
            security,
            credentials,
            protocol,
            device_routing: false,
        }
    }

    /// Sets the security mode and moves to that mode's default port.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self.port = self.protocol.default_port(security);
        self
    }

    /// Overrides the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the device-routing flag.
    #[must_use]
    pub const fn device_routing(mut self, enabled: bool) -> Self {
        self.device_routing = enabled;
        self
    }

    /// Connection options for the line connection.
    #[must_use]
    pub fn connect_options(&self, timeout: Duration) -> ConnectOptions {
        ConnectOptions::new(&self.host, self.port, self.security).connect_timeout(timeout)
    }

    /// Checks the settings before a connection is attempted.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost);
        }
        if self.port == 0 {
            errors.push(ValidationError::InvalidPort);
        }
        if self.credentials.username.trim().is_empty() {
            errors.push(ValidationError::EmptyUsername);
        }
        if self.credentials.password.is_empty() {
            errors.push(ValidationError::EmptyPassword);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Outgoing mail server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Credentials; `None` sends without AUTH.
    pub credentials: Option<Credentials>,
    /// SASL mechanism used when credentials are present.
    #[serde(default)]
    pub mechanism: AuthMechanism,
    /// Name announced in EHLO.
    pub client_name: String,
}

impl SmtpConfig {
    /// Creates a configuration for STARTTLS on the submission port.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::default_port(Security::StartTls),
            security: Security::StartTls,
            credentials: None,
            mechanism: AuthMechanism::default(),
            client_name: "localhost".to_string(),
        }
    }

    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(security: Security) -> u16 {
        match security {
            Security::None => 25,
            Security::StartTls => 587,
            Security::Implicit => 465,
        }
    }

    /// Sets the security mode and moves to that mode's default port.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self.port = Self::default_port(security);
        self
    }

    /// Overrides the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Authenticates with `mechanism`.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials, mechanism: AuthMechanism) -> Self {
        self.credentials = Some(credentials);
        self.mechanism = mechanism;
        self
    }

    /// Sets the EHLO name.
    #[must_use]
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Connection options for the line connection.
    #[must_use]
    pub fn connect_options(&self, timeout: Duration) -> ConnectOptions {
        ConnectOptions::new(&self.host, self.port, self.security).connect_timeout(timeout)
    }
}

/// Retrieval limits shared by every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Newest messages listed per folder fetch.
    pub max_retrieved_headers: u32,
    /// Deepest folder level listed over IMAP; 1 lists top-level folders only.
    pub imap_max_folder_depth: u32,
    /// Byte budget for the sections of one IMAP message.
    pub imap_max_message_size: usize,
    /// Body lines requested with POP3 TOP.
    pub pop_max_lines: u32,
    /// Timeout for establishing a connection.
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_retrieved_headers: 50,
            imap_max_folder_depth: 3,
            imap_max_message_size: 512 * 1024,
            pop_max_lines: 1000,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Validation error for account configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Host is empty.
    EmptyHost,
    /// Port is zero.
    InvalidPort,
    /// Username is empty.
    EmptyUsername,
    /// Password is empty.
    EmptyPassword,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptyHost => "Server is required",
            Self::InvalidPort => "Port must be 1-65535",
            Self::EmptyUsername => "Username is required",
            Self::EmptyPassword => "Password is required",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::EmptyHost => "host",
            Self::InvalidPort => "port",
            Self::EmptyUsername => "username",
            Self::EmptyPassword => "password",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let account = AccountConfig::imap("imap.example.com", Credentials::new("ann", "pw"));
        assert_eq!(account.port, 993);
        assert_eq!(account.security(Security::StartTls).port, 143);

        let account = AccountConfig::pop3("pop.example.com", Credentials::new("ann", "pw"));
        assert_eq!(account.port, 995);
        assert_eq!(account.security(Security::None).port, 110);

        assert_eq!(SmtpConfig::new("smtp.example.com").port, 587);
        assert_eq!(SmtpConfig::new("smtp.example.com").security(Security::Implicit).port, 465);
    }

    #[test]
    fn test_validate() {
        let account = AccountConfig::imap("imap.example.com", Credentials::new("ann", "pw"));
        assert!(account.validate().is_ok());

        let broken = AccountConfig::imap(" ", Credentials::new("", "")).port(0);
        let errors = broken.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyHost,
                ValidationError::InvalidPort,
                ValidationError::EmptyUsername,
                ValidationError::EmptyPassword,
            ]
        );
        assert_eq!(errors[1].field(), "port");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("ann", "hunter2"));
        assert!(debug.contains("ann"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_serde_round_trip() {
        let account = AccountConfig::pop3("pop.example.com", Credentials::new("ann", "pw"))
            .device_routing(true);
        let json = serde_json::to_string(&account).unwrap();
        assert!(json.contains("\"pop3\""));
        let back: AccountConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);

        let limits: Limits = serde_json::from_str(r#"{"pop_max_lines": 20}"#).unwrap();
        assert_eq!(limits.pop_max_lines, 20);
        assert_eq!(limits.max_retrieved_headers, 50);
        assert_eq!(limits.connect_timeout, Duration::from_secs(30));
    }
}
