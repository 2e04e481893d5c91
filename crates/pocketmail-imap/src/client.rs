//! IMAP client over a line connection.
//!
//! Every command is sent as `<tag> <COMMAND> <args>` and completes when a
//! line starting with the same tag arrives. Everything before it (untagged
//! `*` data and `+` continuations) is returned as raw responses, with any
//! `{n}` literals read inline.

#![allow(clippy::missing_errors_doc)]

use std::time::Duration;

use pocketmail_net::{LineConnection, TlsUpgrade};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::command::{Command, FetchAttribute, TagGenerator};
use crate::parser::{
    FetchResponse, parse_capabilities, parse_fetch_response, parse_list_response,
    parse_mailbox_event, parse_select, parse_status_response,
};
use crate::types::{Flag, FolderStatus, ListEntry, MailboxEvent, MailboxStatus, StoreAction};
use crate::{Error, Result};

/// Maximum literal size to prevent memory exhaustion.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Result of a completed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedResponse {
    /// Untagged and continuation responses, literals inlined.
    pub untagged: Vec<Vec<u8>>,
    /// Text after `OK` on the tagged line.
    pub text: String,
}

/// IMAP client.
///
/// Commands take `&mut self`, so one connection serves one caller at a
/// time. Tags start at `A0` for each new client.
pub struct ImapClient<S> {
    conn: LineConnection<S>,
    tags: TagGenerator,
    capabilities: Vec<String>,
    idle_tag: Option<String>,
}

impl<S> std::fmt::Debug for ImapClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapClient")
            .field("tags", &self.tags)
            .field("capabilities", &self.capabilities)
            .field("idle_tag", &self.idle_tag)
            .finish_non_exhaustive()
    }
}

impl<S> ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected line connection. Call [`greeting`](Self::greeting) next.
    pub fn new(conn: LineConnection<S>) -> Self {
        Self {
            conn,
            tags: TagGenerator::default(),
            capabilities: Vec::new(),
            idle_tag: None,
        }
    }

    /// The underlying connection, for byte counters.
    pub const fn connection(&self) -> &LineConnection<S> {
        &self.conn
    }

    /// Number the next command's tag will carry.
    #[must_use]
    pub const fn next_tag_number(&self) -> u32 {
        self.tags.issued()
    }

    /// Capabilities from the last CAPABILITY data seen.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Checks for a capability, case-insensitively.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Returns true while an IDLE command is outstanding.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.idle_tag.is_some()
    }

    /// Reads the server greeting.
    ///
    /// Capabilities announced in the greeting are remembered.
    pub async fn greeting(&mut self) -> Result<String> {
        let line = self.conn.receive().await?;
        let upper = line.to_ascii_uppercase();

        if upper.starts_with("* BYE") {
            return Err(Error::Bye(status_text(&line, "* BYE")));
        }
        if !upper.starts_with("* OK") && !upper.starts_with("* PREAUTH") {
            return Err(Error::Protocol(format!("unexpected greeting: {line}")));
        }

        if let Some(caps) = parse_capabilities(line.as_bytes()) {
            self.capabilities = caps;
        }
        info!(greeting = %line, "IMAP server ready");
        Ok(line)
    }

    /// Sends a command and reads until its tagged completion.
    pub async fn execute(&mut self, command: &Command) -> Result<TaggedResponse> {
        let tag = self.send_command(command).await?;
        self.read_until_tagged(&tag, true).await
    }

    async fn send_command(&mut self, command: &Command) -> Result<String> {
        if self.idle_tag.is_some() {
            return Err(Error::InvalidState(format!(
                "{} while IDLE is active",
                command.name()
            )));
        }
        let tag = self.tags.next_tag();
        debug!(command = %command.redacted(&tag), "IMAP command");
        self.conn.send(&command.serialize(&tag)).await?;
        Ok(tag)
    }

    /// Reads one logical response: a line plus any literals it announces.
    async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = self.conn.receive_bytes().await?;

        while let Some(len) = literal_length(&response) {
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let literal = self.conn.read_exact(len).await?;
            response.extend_from_slice(b"\r\n");
            response.extend_from_slice(&literal);
            let rest = self.conn.receive_bytes().await?;
            response.extend_from_slice(&rest);
        }

        Ok(response)
    }

    /// Collects responses until the line tagged `tag`.
    ///
    /// `OK` completes the command; `NO`/`BAD` fail it with the status word
    /// stripped. An untagged BYE means the server is going away and fails
    /// the command too, unless `bye_fatal` is false (LOGOUT).
    async fn read_until_tagged(&mut self, tag: &str, bye_fatal: bool) -> Result<TaggedResponse> {
        let mut untagged = Vec::new();

        loop {
            let response = self.read_response().await?;

            if let Some(rest) = strip_tag(&response, tag) {
                if let Some(caps) = parse_capabilities(&response) {
                    self.capabilities = caps;
                }
                let text = completion(rest)?;
                return Ok(TaggedResponse { untagged, text });
            }

            if bye_fatal && is_bye(&response) {
                let line = String::from_utf8_lossy(&response);
                return Err(Error::Bye(status_text(&line, "* BYE")));
            }
            if let Some(caps) = parse_capabilities(&response) {
                self.capabilities = caps;
            }
            untagged.push(response);
        }
    }

    /// Refreshes the capability list.
    pub async fn capability(&mut self) -> Result<Vec<String>> {
        self.execute(&Command::Capability).await?;
        Ok(self.capabilities.clone())
    }

    /// Logs in with a username and password.
    ///
    /// A `NO` or `BAD` completion is an authentication failure.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.execute(&command).await {
            Ok(_) => {
                info!(user = %username, "IMAP login succeeded");
                Ok(())
            }
            Err(Error::No(text) | Error::Bad(text)) => Err(Error::Auth(text)),
            Err(e) => Err(e),
        }
    }

    /// Ends the session. The server's BYE is expected here.
    pub async fn logout(&mut self) -> Result<()> {
        let tag = self.send_command(&Command::Logout).await?;
        if let Err(e) = self.read_until_tagged(&tag, false).await {
            debug!(error = %e, "LOGOUT not acknowledged");
        }
        Ok(())
    }

    /// Closes the selected mailbox, expunging `\Deleted` messages.
    pub async fn close(&mut self) -> Result<()> {
        self.execute(&Command::Close).await?;
        Ok(())
    }

    /// Selects a mailbox.
    pub async fn select(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        let response = self
            .execute(&Command::Select {
                mailbox: mailbox.to_string(),
            })
            .await?;
        let status = parse_select(&response.untagged);
        debug!(mailbox, exists = status.exists, "selected");
        Ok(status)
    }

    /// Lists mailboxes matching `pattern` under `reference`.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListEntry>> {
        let response = self
            .execute(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;

        let mut entries = Vec::new();
        for line in &response.untagged {
            if let Some(entry) = parse_list_response(line)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Queries message and unseen counts without selecting the mailbox.
    pub async fn status(&mut self, mailbox: &str) -> Result<FolderStatus> {
        let response = self
            .execute(&Command::Status {
                mailbox: mailbox.to_string(),
            })
            .await?;

        for line in &response.untagged {
            if let Some(status) = parse_status_response(line)? {
                return Ok(status);
            }
        }
        Err(Error::Protocol(format!("no STATUS data for {mailbox}")))
    }

    /// Fetches data items for a sequence range.
    ///
    /// Untagged responses other than FETCH are ignored; a FETCH response
    /// that breaks the grammar fails the whole call. Per-message mapping
    /// of ENVELOPE and BODYSTRUCTURE is left to the caller, so one bad
    /// envelope does not hide its siblings.
    pub async fn fetch(
        &mut self,
        range: &str,
        items: &[FetchAttribute],
    ) -> Result<Vec<FetchResponse>> {
        let response = self
            .execute(&Command::Fetch {
                range: range.to_string(),
                items: items.to_vec(),
            })
            .await?;

        let mut fetched = Vec::new();
        for line in &response.untagged {
            if let Some(fetch) = parse_fetch_response(line)? {
                fetched.push(fetch);
            }
        }
        Ok(fetched)
    }

    /// Adds or removes flags on one message.
    pub async fn store_flags(&mut self, seq: u32, action: StoreAction, flags: &[Flag]) -> Result<()> {
        self.execute(&Command::Store {
            seq,
            action,
            flags: flags.to_vec(),
        })
        .await?;
        Ok(())
    }

    /// Permanently removes `\Deleted` messages; returns expunged sequence numbers.
    pub async fn expunge(&mut self) -> Result<Vec<u32>> {
        let response = self.execute(&Command::Expunge).await?;
        Ok(response
            .untagged
            .iter()
            .filter_map(|line| match parse_mailbox_event(line) {
                Some(MailboxEvent::Expunge(seq)) => Some(seq),
                _ => None,
            })
            .collect())
    }

    /// Keepalive; returns any mailbox updates the server piggybacked.
    pub async fn noop(&mut self) -> Result<Vec<MailboxEvent>> {
        let response = self.execute(&Command::Noop).await?;
        Ok(mailbox_events(&response.untagged))
    }

    /// Enters IDLE (RFC 2177).
    ///
    /// Requires the IDLE capability. Until [`done`](Self::done) only
    /// [`poll_idle`](Self::poll_idle) may be used.
    pub async fn idle(&mut self) -> Result<()> {
        if !self.has_capability("IDLE") {
            return Err(Error::InvalidState("server does not support IDLE".to_string()));
        }
        let tag = self.send_command(&Command::Idle).await?;

        loop {
            let response = self.read_response().await?;
            if response.starts_with(b"+") {
                break;
            }
            if let Some(rest) = strip_tag(&response, &tag) {
                completion(rest)?;
                return Err(Error::Protocol("IDLE completed without continuation".to_string()));
            }
            if is_bye(&response) {
                let line = String::from_utf8_lossy(&response);
                return Err(Error::Bye(status_text(&line, "* BYE")));
            }
        }

        debug!(tag, "IDLE started");
        self.idle_tag = Some(tag);
        Ok(())
    }

    /// Waits up to `wait` for one update while idling.
    ///
    /// Returns `Ok(None)` on timeout, for untagged data that is not a
    /// mailbox update, and when the server ends IDLE on its own.
    pub async fn poll_idle(&mut self, wait: Duration) -> Result<Option<MailboxEvent>> {
        let Some(tag) = self.idle_tag.clone() else {
            return Err(Error::InvalidState("IDLE is not active".to_string()));
        };

        if tokio::time::timeout(wait, self.conn.wait_readable()).await.is_err() {
            return Ok(None);
        }
        let response = self.read_response().await?;

        if strip_tag(&response, &tag).is_some() {
            debug!(tag, "server ended IDLE");
            self.idle_tag = None;
            return Ok(None);
        }
        if is_bye(&response) {
            let line = String::from_utf8_lossy(&response);
            return Err(Error::Bye(status_text(&line, "* BYE")));
        }
        Ok(parse_mailbox_event(&response))
    }

    /// Leaves IDLE; returns updates that arrived before the completion.
    pub async fn done(&mut self) -> Result<Vec<MailboxEvent>> {
        let Some(tag) = self.idle_tag.take() else {
            return Err(Error::InvalidState("IDLE is not active".to_string()));
        };
        self.conn.send("DONE").await?;
        let response = self.read_until_tagged(&tag, true).await?;
        Ok(mailbox_events(&response.untagged))
    }
}

impl<S> ImapClient<S>
where
    S: TlsUpgrade,
{
    /// Upgrades the connection with STARTTLS.
    ///
    /// Capabilities are cleared since they must be fetched again over TLS.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        self.execute(&Command::StartTls).await?;
        self.conn = self.conn.start_tls(host).await?;
        self.capabilities.clear();
        info!(host, "IMAP connection upgraded to TLS");
        Ok(self)
    }

    /// Returns true if the connection is TLS-encrypted.
    pub fn is_tls(&self) -> bool {
        self.conn.is_tls()
    }
}

fn mailbox_events(responses: &[Vec<u8>]) -> Vec<MailboxEvent> {
    responses
        .iter()
        .filter_map(|line| parse_mailbox_event(line))
        .collect()
}

/// Interprets the text after a tag: `OK` yields the remaining text,
/// `NO`/`BAD` become errors with the status word stripped.
fn completion(rest: &[u8]) -> Result<String> {
    let rest = String::from_utf8_lossy(rest);
    let (status, text) = rest.split_once(' ').unwrap_or((rest.as_ref(), ""));
    let text = text.to_string();

    match status.to_ascii_uppercase().as_str() {
        "OK" => Ok(text),
        "NO" => Err(Error::No(text)),
        "BAD" => Err(Error::Bad(text)),
        other => Err(Error::Protocol(format!("unknown completion status {other}"))),
    }
}

fn strip_tag<'a>(response: &'a [u8], tag: &str) -> Option<&'a [u8]> {
    response
        .strip_prefix(tag.as_bytes())
        .and_then(|rest| rest.strip_prefix(b" "))
}

fn is_bye(response: &[u8]) -> bool {
    response.len() >= 5 && response[..5].eq_ignore_ascii_case(b"* BYE")
}

fn status_text(line: &str, prefix: &str) -> String {
    line.get(prefix.len()..).unwrap_or_default().trim().to_string()
}

/// Returns `n` if the line ends with a `{n}` literal announcement.
fn literal_length(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"}")?;
    let open = body.iter().rposition(|&b| b == b'{')?;
    let digits = &body[open + 1..];
    let digits = digits.strip_suffix(b"+").unwrap_or(digits);
    if digits.is_empty() {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
