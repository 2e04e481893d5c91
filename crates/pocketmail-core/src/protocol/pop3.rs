//! POP3 adapter.
//!
//! POP3 has one folder, INBOX. Message numbers are fixed when the session
//! opens; DELE only marks, so numbers never shift until QUIT.

use std::collections::HashMap;
use std::time::Duration;

use pocketmail_mime::{Envelope, parse_envelope, parse_message, split_header_block};
use pocketmail_net::Security;
use pocketmail_pop3::Pop3Client;
use tracing::{debug, info, warn};

use super::{Dialer, FolderUpdate, MailProtocol};
use crate::capability::Capabilities;
use crate::config::{AccountConfig, Limits};
use crate::folder::{FolderItem, FolderStatus, INBOX};
use crate::message::{FetchedMessage, FolderMessage, MessageFlags, MessageRange, MessageToken};
use crate::{Error, Result};

/// [`MailProtocol`] over POP3.
pub struct Pop3Protocol<D: Dialer> {
    dialer: D,
    account: AccountConfig,
    limits: Limits,
    client: Option<Pop3Client<D::Stream>>,
    count: u32,
    envelopes: HashMap<u32, Envelope>,
    capabilities: Capabilities,
}

impl<D: Dialer> std::fmt::Debug for Pop3Protocol<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pop3Protocol")
            .field("host", &self.account.host)
            .field("open", &self.client.is_some())
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

impl<D: Dialer> Pop3Protocol<D> {
    /// Creates a closed adapter.
    pub fn new(dialer: D, account: AccountConfig, limits: Limits) -> Self {
        Self {
            dialer,
            account,
            limits,
            client: None,
            count: 0,
            envelopes: HashMap::new(),
            capabilities: Capabilities::default(),
        }
    }

    /// Number of messages when the session opened.
    #[must_use]
    pub const fn message_count(&self) -> u32 {
        self.count
    }

    fn client(&mut self) -> Result<&mut Pop3Client<D::Stream>> {
        self.client.as_mut().ok_or(Error::NotOpen)
    }

    fn check_folder(folder: &str) -> Result<()> {
        if folder.eq_ignore_ascii_case(INBOX) {
            Ok(())
        } else {
            Err(Error::FolderNotFound(folder.to_string()))
        }
    }

    /// Resolves a token to its message number, checking the UIDL value
    /// when both sides have one.
    async fn index(&mut self, folder: &str, token: &MessageToken) -> Result<u32> {
        Self::check_folder(folder)?;
        let MessageToken::Pop3 { index, uid } = token else {
            return Err(Error::WrongProtocol);
        };
        if *index == 0 || *index > self.count {
            return Err(Error::StaleToken(token.to_string()));
        }
        if let Some(expected) = uid {
            let current = self.client()?.uidl(*index).await?;
            if current.as_ref().is_some_and(|current| current != expected) {
                return Err(Error::StaleToken(token.to_string()));
            }
        }
        Ok(*index)
    }

    async fn envelope(&mut self, index: u32) -> Result<Envelope> {
        if let Some(envelope) = self.envelopes.get(&index) {
            return Ok(envelope.clone());
        }
        let client = self.client()?;
        if client.is_marked_deleted(index) {
            return Ok(Envelope::placeholder());
        }
        let envelope = match client.top(index, 0).await {
            Ok(headers) => parse_envelope(&headers),
            Err(pocketmail_pop3::Error::Server(text)) => {
                warn!(index, reply = %text, "headers unavailable, using placeholder");
                return Ok(Envelope::placeholder());
            }
            Err(e) => return Err(e.into()),
        };
        self.envelopes.insert(index, envelope.clone());
        Ok(envelope)
    }
}

impl<D: Dialer> MailProtocol for Pop3Protocol<D> {
    async fn open(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }
        info!(
            host = %self.account.host,
            port = self.account.port,
            security = ?self.account.security,
            device_routing = self.account.device_routing,
            "opening POP3 connection"
        );

        let conn = self
            .dialer
            .dial(&self.account, self.limits.connect_timeout)
            .await?;
        let mut client = Pop3Client::new(conn);
        client.greeting().await?;
        let advertised = client.capa().await?.is_some();

        if self.account.security == Security::StartTls {
            if advertised && !client.has_capability("STLS") {
                return Err(Error::Pop3(pocketmail_pop3::Error::Protocol(
                    "server does not offer STLS".to_string(),
                )));
            }
            client = client.stls(&self.account.host).await?;
            client.capa().await?;
        }

        let credentials = &self.account.credentials;
        client
            .login(&credentials.username, &credentials.password)
            .await?;
        self.count = client.stat().await?;
        debug!(count = self.count, "maildrop opened");

        self.capabilities = Capabilities::from_lines(client.capabilities());
        self.envelopes.clear();
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        client.quit().await?;
        info!(host = %self.account.host, "POP3 connection closed");
        Ok(())
    }

    fn force_close(&mut self) {
        if self.client.take().is_some() {
            warn!(host = %self.account.host, "POP3 connection dropped, deletions discarded");
        }
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn folder_tree(&mut self) -> Result<FolderItem> {
        let status = self.folder_status(INBOX).await?;
        Ok(FolderItem::synthetic_inbox(Some(status)))
    }

    async fn folder_status(&mut self, path: &str) -> Result<FolderStatus> {
        Self::check_folder(path)?;
        let messages = self.client()?.stat().await?;
        Ok(FolderStatus {
            messages,
            unseen: None,
        })
    }

    async fn fetch_messages(
        &mut self,
        folder: &str,
        range: MessageRange,
    ) -> Result<Vec<FolderMessage>> {
        Self::check_folder(folder)?;
        self.client()?;
        let Some(range) = range.clip(self.count, self.limits.max_retrieved_headers) else {
            return Ok(Vec::new());
        };

        let mut messages = Vec::with_capacity(range.clone().count());
        for index in range {
            let uid = self.client()?.uidl(index).await?;
            let envelope = self.envelope(index).await?;
            let deleted = self.client()?.is_marked_deleted(index);
            messages.push(FolderMessage {
                token: MessageToken::Pop3 { index, uid },
                envelope,
                flags: MessageFlags {
                    deleted,
                    ..MessageFlags::default()
                },
            });
        }
        Ok(messages)
    }

    async fn fetch_message(&mut self, folder: &str, token: &MessageToken) -> Result<FetchedMessage> {
        let index = self.index(folder, token).await?;
        let max_lines = self.limits.pop_max_lines;
        let raw = self.client()?.top(index, max_lines).await?;

        // TOP stops at the cap; only the size tells a cut message from
        // one that is exactly that long.
        let body_lines = split_header_block(&raw)
            .1
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        let cut = if body_lines >= max_lines as usize {
            let size = self.client()?.list_size(index).await?;
            debug!(index, size, received = raw.len(), "line cap reached");
            size > raw.len()
        } else {
            false
        };
        let parsed = parse_message(&raw, None)?;
        self.envelopes.insert(index, parsed.envelope.clone());

        Ok(FetchedMessage {
            token: token.clone(),
            envelope: parsed.envelope,
            root: parsed.root,
            contents: parsed.contents,
            truncated: parsed.truncated || cut,
        })
    }

    async fn delete(&mut self, folder: &str, token: &MessageToken) -> Result<()> {
        let index = self.index(folder, token).await?;
        self.client()?.dele(index).await?;
        Ok(())
    }

    async fn undelete(&mut self, folder: &str, token: &MessageToken) -> Result<()> {
        let index = self.index(folder, token).await?;
        self.client()?.undele(index).await?;
        Ok(())
    }

    async fn idle_begin(&mut self) -> Result<bool> {
        self.client()?;
        Ok(false)
    }

    async fn idle_poll(&mut self, _wait: Duration) -> Result<Option<FolderUpdate>> {
        self.client()?;
        Ok(None)
    }

    async fn idle_end(&mut self) -> Result<()> {
        self.client()?;
        Ok(())
    }

    async fn noop(&mut self) -> Result<Option<FolderUpdate>> {
        self.client()?.noop().await?;
        Ok(None)
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}
