//! POP3 client over a line connection.

#![allow(clippy::missing_errors_doc)]

use std::collections::BTreeSet;
use std::fmt::Write as _;

use md5::{Digest, Md5};
use pocketmail_net::{LineConnection, TlsUpgrade};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::command::Command;
use crate::parser::{
    Reply, apop_timestamp, is_terminator, parse_list_size, parse_listing_entry, parse_stat,
    parse_uidl, unstuff,
};
use crate::{Error, Result};

/// POP3 client.
///
/// Message numbers are those assigned when the session started. DELE only
/// marks a message, so every number stays valid until QUIT; the client
/// remembers which numbers it marked.
pub struct Pop3Client<S> {
    conn: LineConnection<S>,
    timestamp: Option<String>,
    capabilities: Vec<String>,
    deleted: BTreeSet<u32>,
}

impl<S> std::fmt::Debug for Pop3Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pop3Client")
            .field("capabilities", &self.capabilities)
            .field("deleted", &self.deleted)
            .finish_non_exhaustive()
    }
}

impl<S> Pop3Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client over an open connection.
    pub const fn new(conn: LineConnection<S>) -> Self {
        Self {
            conn,
            timestamp: None,
            capabilities: Vec::new(),
            deleted: BTreeSet::new(),
        }
    }

    /// Returns the underlying connection.
    pub const fn connection(&self) -> &LineConnection<S> {
        &self.conn
    }

    /// Capabilities from the last CAPA.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Returns true if CAPA listed `name` (case-insensitive, first word).
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|cap| {
            cap.split_whitespace()
                .next()
                .is_some_and(|word| word.eq_ignore_ascii_case(name))
        })
    }

    /// Returns true if `msg` was marked with DELE in this session.
    #[must_use]
    pub fn is_marked_deleted(&self, msg: u32) -> bool {
        self.deleted.contains(&msg)
    }

    /// Reads the server greeting, remembering an APOP timestamp if offered.
    pub async fn greeting(&mut self) -> Result<String> {
        let line = self.conn.receive().await?;
        if let Reply::Err(text) = Reply::parse(&line) {
            return Err(Error::Server(text));
        }
        self.timestamp = apop_timestamp(&line).map(str::to_string);
        info!(greeting = %line, "POP3 server ready");
        Ok(line)
    }

    /// Sends a command and reads its status line.
    ///
    /// Returns the whole reply line on `+OK`. On `-ERR`, fails with
    /// [`Error::Server`] when `error_fatal` is set and returns `None`
    /// otherwise.
    pub async fn execute(&mut self, command: &Command, error_fatal: bool) -> Result<Option<String>> {
        debug!(command = %command.redacted(), "POP3 command");
        self.conn.send(&command.serialize()).await?;
        let line = self.conn.receive().await?;

        match Reply::parse(&line) {
            Reply::Ok(_) => Ok(Some(line)),
            Reply::Err(text) if error_fatal => Err(Error::Server(text)),
            Reply::Err(text) => {
                debug!(command = command.name(), reply = %text, "optional command refused");
                Ok(None)
            }
        }
    }

    /// Like [`execute`](Self::execute), then reads the dot-terminated body.
    ///
    /// Body lines are returned without the terminator and with
    /// byte-stuffing undone.
    pub async fn execute_multiline(
        &mut self,
        command: &Command,
        error_fatal: bool,
    ) -> Result<Option<Vec<Vec<u8>>>> {
        if self.execute(command, error_fatal).await?.is_none() {
            return Ok(None);
        }
        self.read_body().await.map(Some)
    }

    async fn read_body(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        loop {
            let line = self.conn.receive_bytes().await?;
            if is_terminator(&line) {
                return Ok(lines);
            }
            lines.push(unstuff(&line).to_vec());
        }
    }

    async fn execute_fatal(&mut self, command: &Command) -> Result<String> {
        self.execute(command, true)
            .await?
            .ok_or_else(|| Error::Protocol(format!("{} refused", command.name())))
    }

    async fn message_body(&mut self, command: &Command) -> Result<Vec<u8>> {
        let lines = self
            .execute_multiline(command, true)
            .await?
            .ok_or_else(|| Error::Protocol(format!("{} refused", command.name())))?;

        let mut body = Vec::with_capacity(lines.iter().map(|l| l.len() + 2).sum());
        for line in lines {
            body.extend_from_slice(&line);
            body.extend_from_slice(b"\r\n");
        }
        Ok(body)
    }

    /// Queries capabilities. Servers without CAPA yield `None`.
    pub async fn capa(&mut self) -> Result<Option<Vec<String>>> {
        let Some(lines) = self.execute_multiline(&Command::Capa, false).await? else {
            return Ok(None);
        };
        self.capabilities = lines
            .iter()
            .map(|line| String::from_utf8_lossy(line).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Ok(Some(self.capabilities.clone()))
    }

    /// Authenticates with USER and PASS.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        match self.user_pass(username, password).await {
            Ok(_) => {
                info!(user = %username, "POP3 login succeeded");
                Ok(())
            }
            Err(Error::Server(text)) => Err(Error::Auth(text)),
            Err(e) => Err(e),
        }
    }

    async fn user_pass(&mut self, username: &str, password: &str) -> Result<String> {
        self.execute_fatal(&Command::User(username.to_string())).await?;
        self.execute_fatal(&Command::Pass(password.to_string())).await
    }

    /// Authenticates with APOP, using the greeting's timestamp.
    pub async fn apop(&mut self, username: &str, password: &str) -> Result<()> {
        let Some(timestamp) = self.timestamp.as_deref() else {
            return Err(Error::InvalidState("greeting offered no APOP timestamp".to_string()));
        };
        let command = Command::Apop {
            user: username.to_string(),
            digest: apop_digest(timestamp, password),
        };
        match self.execute_fatal(&command).await {
            Ok(_) => Ok(()),
            Err(Error::Server(text)) => Err(Error::Auth(text)),
            Err(e) => Err(e),
        }
    }

    /// Number of messages in the maildrop.
    pub async fn stat(&mut self) -> Result<u32> {
        let line = self.execute_fatal(&Command::Stat).await?;
        parse_stat(&line).ok_or_else(|| Error::Protocol(format!("malformed STAT reply: {line}")))
    }

    /// Unique id of one message; `None` if refused or malformed.
    pub async fn uidl(&mut self, msg: u32) -> Result<Option<String>> {
        let line = self.execute(&Command::Uidl(Some(msg)), false).await?;
        Ok(line.as_deref().and_then(parse_uidl))
    }

    /// Unique ids of all messages; `None` if UIDL is unsupported.
    pub async fn uidl_all(&mut self) -> Result<Option<Vec<(u32, String)>>> {
        let Some(lines) = self.execute_multiline(&Command::Uidl(None), false).await? else {
            return Ok(None);
        };
        Ok(Some(
            lines
                .iter()
                .filter_map(|line| {
                    let line = String::from_utf8_lossy(line);
                    parse_listing_entry(&line).map(|(msg, uid)| (msg, uid.to_string()))
                })
                .collect(),
        ))
    }

    /// Size of one message in octets.
    pub async fn list_size(&mut self, msg: u32) -> Result<usize> {
        let line = self.execute_fatal(&Command::List(Some(msg))).await?;
        parse_list_size(&line).ok_or_else(|| Error::Protocol(format!("malformed LIST reply: {line}")))
    }

    /// Headers plus the first `lines` body lines; 0 fetches headers only.
    pub async fn top(&mut self, msg: u32, lines: u32) -> Result<Vec<u8>> {
        self.message_body(&Command::Top { msg, lines }).await
    }

    /// The whole message.
    pub async fn retr(&mut self, msg: u32) -> Result<Vec<u8>> {
        self.message_body(&Command::Retr(msg)).await
    }

    /// Marks a message deleted. Message numbers do not shift.
    ///
    /// Marking an already marked message is a no-op.
    pub async fn dele(&mut self, msg: u32) -> Result<()> {
        if self.deleted.contains(&msg) {
            debug!(msg, "already marked deleted");
            return Ok(());
        }
        self.execute_fatal(&Command::Dele(msg)).await?;
        self.deleted.insert(msg);
        Ok(())
    }

    /// Unmarks every message deleted in this session.
    pub async fn rset(&mut self) -> Result<()> {
        self.execute_fatal(&Command::Rset).await?;
        self.deleted.clear();
        Ok(())
    }

    /// Unmarks one message, leaving every other mark in place.
    ///
    /// POP3 can only unmark everything, so this sends RSET and then DELE
    /// again for the other marked messages. An unmarked message needs no
    /// command at all. Returns true if anything went to the server.
    pub async fn undele(&mut self, msg: u32) -> Result<bool> {
        if !self.deleted.contains(&msg) {
            debug!(msg, "not marked deleted");
            return Ok(false);
        }
        let remark: Vec<u32> = self.deleted.iter().copied().filter(|&n| n != msg).collect();
        self.rset().await?;
        for other in remark {
            self.dele(other).await?;
        }
        Ok(true)
    }

    /// Keepalive.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute_fatal(&Command::Noop).await?;
        Ok(())
    }

    /// Ends the session; marked messages are removed by the server.
    pub async fn quit(mut self) -> Result<()> {
        self.execute_fatal(&Command::Quit).await?;
        if !self.deleted.is_empty() {
            info!(count = self.deleted.len(), "POP3 session committed deletions");
        }
        Ok(())
    }
}

impl<S> Pop3Client<S>
where
    S: TlsUpgrade,
{
    /// Upgrades the connection with STLS (RFC 2595).
    ///
    /// Capabilities are cleared since they must be queried again over TLS.
    pub async fn stls(mut self, host: &str) -> Result<Self> {
        self.execute_fatal(&Command::Stls).await?;
        self.conn = self.conn.start_tls(host).await?;
        self.capabilities.clear();
        info!(host, "POP3 connection upgraded to TLS");
        Ok(self)
    }

    /// Returns true if the connection is TLS-encrypted.
    pub fn is_tls(&self) -> bool {
        self.conn.is_tls()
    }
}

/// Hex MD5 of the greeting timestamp followed by the secret (RFC 1939).
fn apop_digest(timestamp: &str, password: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().iter().fold(String::with_capacity(32), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}
