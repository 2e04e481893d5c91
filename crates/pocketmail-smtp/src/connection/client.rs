//! Type-state SMTP client.

#![allow(clippy::missing_errors_doc)]

use std::marker::PhantomData;

use pocketmail_net::{LineConnection, TlsUpgrade};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::ServerInfo;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::sasl::{cram_md5_response, login_response, plain_response};
use crate::types::{Address, AuthMechanism, Reply, ReplyCode};

/// Type-state marker for a greeted, unauthenticated session.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for an authenticated session.
#[derive(Debug)]
pub struct Authenticated;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Connected {}
    impl Sealed for super::Authenticated {}
}

/// States in which mail transactions may run.
pub trait SessionState: sealed::Sealed {}
impl SessionState for Connected {}
impl SessionState for Authenticated {}

/// SMTP client with type-state pattern.
pub struct SmtpClient<S, State = Connected> {
    conn: LineConnection<S>,
    server_info: ServerInfo,
    client_name: String,
    messages_sent: usize,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for SmtpClient<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpClient")
            .field("server_info", &self.server_info)
            .field("messages_sent", &self.messages_sent)
            .finish_non_exhaustive()
    }
}

impl<S> SmtpClient<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the server greeting, which must be `220`.
    pub async fn greeting(mut conn: LineConnection<S>) -> Result<Self> {
        let greeting = read_reply(&mut conn).await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(greeting.into_error());
        }
        info!(greeting = %greeting.message_text(), "SMTP server ready");

        let hostname = greeting
            .first_line()
            .split_whitespace()
            .next()
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            conn,
            server_info: ServerInfo {
                hostname,
                ..ServerInfo::default()
            },
            client_name: String::new(),
            messages_sent: 0,
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the server's capabilities.
    ///
    /// A server that rejects EHLO with a 5xx code is greeted with HELO
    /// instead and advertises no capabilities.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        self.client_name = client_hostname.to_string();
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        if reply.is_success() {
            self.server_info = ServerInfo::from_ehlo(&reply.message);
            debug!(capabilities = ?self.server_info.capabilities, "EHLO accepted");
            return Ok(self);
        }
        if !reply.code.is_permanent() {
            return Err(reply.into_error());
        }

        warn!(code = %reply.code, "EHLO refused, falling back to HELO");
        let reply = self
            .send_command(&Command::Helo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        self.server_info.capabilities.clear();
        Ok(self)
    }

    /// Authenticates with the given mechanism.
    ///
    /// Any final reply other than `235` is an [`Error::Auth`].
    pub async fn authenticate(
        mut self,
        mechanism: AuthMechanism,
        username: &str,
        password: &str,
    ) -> Result<SmtpClient<S, Authenticated>> {
        let challenge = self.expect_challenge(&Command::Auth { mechanism }).await?;

        let reply = match mechanism {
            AuthMechanism::Plain => {
                self.respond(plain_response(username, password)).await?
            }
            AuthMechanism::Login => {
                self.expect_challenge(&Command::AuthResponse(login_response(username)))
                    .await?;
                self.respond(login_response(password)).await?
            }
            AuthMechanism::CramMd5 => {
                let response = cram_md5_response(username, password, &challenge)?;
                self.respond(response).await?
            }
        };

        if reply.code != ReplyCode::AUTH_SUCCESS {
            return Err(Error::Auth(format!("{} {}", reply.code, reply.message_text())));
        }
        info!(user = %username, %mechanism, "SMTP authentication succeeded");

        Ok(SmtpClient {
            conn: self.conn,
            server_info: self.server_info,
            client_name: self.client_name,
            messages_sent: self.messages_sent,
            _state: PhantomData,
        })
    }

    /// Sends a step of the SASL exchange and requires a `334` challenge,
    /// returning its text.
    async fn expect_challenge(&mut self, command: &Command) -> Result<String> {
        let reply = self.send_command(command).await?;
        if reply.code != ReplyCode::AUTH_CONTINUE {
            return Err(Error::Auth(format!("{} {}", reply.code, reply.message_text())));
        }
        Ok(reply.first_line().to_string())
    }

    async fn respond(&mut self, response: String) -> Result<Reply> {
        self.send_command(&Command::AuthResponse(response)).await
    }
}

impl<S> SmtpClient<S, Connected>
where
    S: TlsUpgrade,
{
    /// Upgrades the connection with STARTTLS, then repeats EHLO.
    ///
    /// The TLS session is in place before any further command is sent.
    pub async fn starttls(mut self, hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.send_command(&Command::StartTls).await?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(reply.into_error());
        }

        self.conn = self.conn.start_tls(hostname).await?;
        info!(host = hostname, "SMTP connection upgraded to TLS");

        let client_name = std::mem::take(&mut self.client_name);
        self.ehlo(&client_name).await
    }

    /// Returns true if the connection is TLS-encrypted.
    pub fn is_tls(&self) -> bool {
        self.conn.is_tls()
    }
}

impl<S, State> SmtpClient<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
    State: SessionState,
{
    /// Returns the server information.
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the underlying connection.
    pub const fn connection(&self) -> &LineConnection<S> {
        &self.conn
    }

    /// Number of messages accepted on this connection.
    pub const fn messages_sent(&self) -> usize {
        self.messages_sent
    }

    /// Starts a transaction. A display-name wrapper is stripped.
    pub async fn mail_from(&mut self, from: &str) -> Result<()> {
        let command = Command::MailFrom {
            from: Address::new(from)?,
            size: None,
        };
        let reply = self.send_command(&command).await?;
        if reply.code != ReplyCode::OK {
            return Err(reply.into_error());
        }
        Ok(())
    }

    /// Adds a recipient. `251` (forwarding) is accepted too.
    pub async fn rcpt_to(&mut self, to: &str) -> Result<()> {
        let command = Command::RcptTo {
            to: Address::new(to)?,
        };
        let reply = self.send_command(&command).await?;
        if reply.code != ReplyCode::OK && reply.code != ReplyCode::FORWARD {
            return Err(reply.into_error());
        }
        Ok(())
    }

    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// byte-stuffed, and the terminating `.` line is added.
    pub async fn data(&mut self, payload: &[u8]) -> Result<()> {
        let reply = self.send_command(&Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(reply.into_error());
        }

        self.conn.send_raw(&stuff_payload(payload)).await?;

        let reply = read_reply(&mut self.conn).await?;
        if reply.code != ReplyCode::OK {
            return Err(reply.into_error());
        }
        self.messages_sent += 1;
        Ok(())
    }

    /// Sends one message. On a reused connection RSET goes first.
    pub async fn send<R: AsRef<str>>(
        &mut self,
        from: &str,
        recipients: &[R],
        payload: &[u8],
    ) -> Result<()> {
        if self.messages_sent > 0 {
            self.rset().await?;
        }
        self.mail_from(from).await?;
        for recipient in recipients {
            self.rcpt_to(recipient.as_ref()).await?;
        }
        self.data(payload).await?;
        debug!(recipients = recipients.len(), bytes = payload.len(), "message accepted");
        Ok(())
    }

    /// Aborts the current transaction.
    pub async fn rset(&mut self) -> Result<()> {
        let reply = self.send_command(&Command::Rset).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(())
    }

    /// Keepalive.
    pub async fn noop(&mut self) -> Result<()> {
        let reply = self.send_command(&Command::Noop).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(())
    }

    /// Sends QUIT and closes the session.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(reply.into_error());
        }
        Ok(())
    }
}

// Common implementation for all states
impl<S, State> SmtpClient<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn send_command(&mut self, command: &Command) -> Result<Reply> {
        debug!(command = %command.redacted(), "SMTP command");
        self.conn.send(&command.serialize()).await?;
        read_reply(&mut self.conn).await
    }
}

async fn read_reply<S>(conn: &mut LineConnection<S>) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let line = conn.receive().await?;
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
    }

    parse_reply(&lines)
}

/// CRLF-normalizes and dot-stuffs a payload and appends the terminator.
fn stuff_payload(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload.len() / 32 + 5);
    let payload = payload.strip_suffix(b"\n").unwrap_or(payload);

    if !payload.is_empty() {
        for line in payload.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_stuff_payload() {
        assert_eq!(
            stuff_payload(b"Subject: x\n\n.hidden\r\nlast"),
            b"Subject: x\r\n\r\n..hidden\r\nlast\r\n.\r\n"
        );
        assert_eq!(stuff_payload(b"one\r\n"), b"one\r\n.\r\n");
        assert_eq!(stuff_payload(b""), b".\r\n");
        assert_eq!(stuff_payload(b"."), b"..\r\n.\r\n");
    }

    #[tokio::test]
    async fn test_greeting_must_be_220() {
        let mock = Builder::new().read(b"554 no service\r\n").build();
        let err = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_ehlo_collects_capabilities() {
        let mock = Builder::new()
            .read(b"220 mail.example.com ESMTP\r\n")
            .write(b"EHLO client.example.com\r\n")
            .read(b"250-mail.example.com hello\r\n250-AUTH PLAIN LOGIN\r\n250-STARTTLS\r\n250 SIZE 1000\r\n")
            .build();
        let client = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap();
        let client = client.ehlo("client.example.com").await.unwrap();

        let info = client.server_info();
        assert!(info.capabilities.contains("STARTTLS"));
        assert!(info.capabilities.contains("AUTH PLAIN LOGIN"));
        assert_eq!(info.max_message_size(), Some(1000));
    }

    #[tokio::test]
    async fn test_helo_fallback() {
        let mock = Builder::new()
            .read(b"220 old.example.com\r\n")
            .write(b"EHLO me\r\n")
            .read(b"502 command not implemented\r\n")
            .write(b"HELO me\r\n")
            .read(b"250 old.example.com\r\n")
            .build();
        let client = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap();
        let client = client.ehlo("me").await.unwrap();
        assert!(client.server_info().capabilities.is_empty());
    }

    #[tokio::test]
    async fn test_starttls_requires_capability() {
        let mock = Builder::new().read(b"220 mail.example.com\r\n").build();
        let client = SmtpClient::greeting(LineConnection::new(
            pocketmail_net::testing::ScriptedStream::new(mock).0,
        ))
        .await
        .unwrap();
        assert!(matches!(
            client.starttls("mail.example.com").await,
            Err(Error::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn test_auth_plain() {
        let mock = Builder::new()
            .read(b"220 mail.example.com\r\n")
            .write(b"AUTH PLAIN\r\n")
            .read(b"334 \r\n")
            .write(b"AHVzZXIAcGFzcw==\r\n")
            .read(b"235 2.7.0 Authentication successful\r\n")
            .build();
        let client = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap();
        client
            .authenticate(AuthMechanism::Plain, "user", "pass")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_auth_login() {
        let mock = Builder::new()
            .read(b"220 mail.example.com\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"dXNlcg==\r\n")
            .read(b"334 UGFzc3dvcmQ6\r\n")
            .write(b"cGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .build();
        let client = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap();
        client
            .authenticate(AuthMechanism::Login, "user", "pass")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_auth_cram_md5() {
        let mock = Builder::new()
            .read(b"220 mail.example.com\r\n")
            .write(b"AUTH CRAM-MD5\r\n")
            .read(b"334 PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+\r\n")
            .write(b"dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw\r\n")
            .read(b"235 Authentication successful\r\n")
            .build();
        let client = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap();
        client
            .authenticate(AuthMechanism::CramMd5, "tim", "tanstaaftanstaaf")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_auth_rejected() {
        let mock = Builder::new()
            .read(b"220 mail.example.com\r\n")
            .write(b"AUTH PLAIN\r\n")
            .read(b"334 \r\n")
            .write(b"AHVzZXIAd3Jvbmc=\r\n")
            .read(b"535 5.7.8 credentials invalid\r\n")
            .build();
        let client = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap();
        let err = client
            .authenticate(AuthMechanism::Plain, "user", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(text) if text.starts_with("535")));
    }

    #[tokio::test]
    async fn test_auth_mechanism_refused() {
        let mock = Builder::new()
            .read(b"220 mail.example.com\r\n")
            .write(b"AUTH CRAM-MD5\r\n")
            .read(b"504 mechanism not supported\r\n")
            .build();
        let client = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap();
        let err = client
            .authenticate(AuthMechanism::CramMd5, "user", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_second_message_sends_rset_first() {
        let mock = Builder::new()
            .read(b"220 mail.example.com\r\n")
            .write(b"MAIL FROM:<ann@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<bob@example.org>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"Subject: one\r\n\r\nhi\r\n.\r\n")
            .read(b"250 queued\r\n")
            .write(b"RSET\r\n")
            .read(b"250 flushed\r\n")
            .write(b"MAIL FROM:<ann@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<cy@example.net>\r\n")
            .read(b"251 forwarding\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"Subject: two\r\n\r\n..\r\n.\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let mut client = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap();

        client
            .send("Ann <ann@example.com>", &["bob@example.org"], b"Subject: one\n\nhi\n")
            .await
            .unwrap();
        client
            .send("ann@example.com", &["\"Cy\" <cy@example.net>"], b"Subject: two\r\n\r\n.\r\n")
            .await
            .unwrap();
        assert_eq!(client.messages_sent(), 2);
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_data_rejected() {
        let mock = Builder::new()
            .read(b"220 mail.example.com\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"x\r\n.\r\n")
            .read(b"554 rejected as spam\r\n")
            .build();
        let mut client = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap();
        let err = client.data(b"x").await.unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(client.messages_sent(), 0);
    }

    #[tokio::test]
    async fn test_recipient_rejected() {
        let mock = Builder::new()
            .read(b"220 mail.example.com\r\n")
            .write(b"RCPT TO:<nobody@example.com>\r\n")
            .read(b"550 no such user\r\n")
            .build();
        let mut client = SmtpClient::greeting(LineConnection::new(mock)).await.unwrap();
        assert!(client.rcpt_to("nobody@example.com").await.unwrap_err().is_permanent());
        assert!(matches!(
            client.rcpt_to("not an address").await,
            Err(Error::InvalidAddress(_))
        ));
    }
}
