//! IMAP adapter.

use std::time::Duration;

use pocketmail_imap::{
    FetchAttribute, Flag, Flags, ImapClient, MailboxEvent, StoreAction, decode_section,
};
use pocketmail_mime::{MessagePart, PartContents, PartId};
use pocketmail_net::Security;
use tracing::{debug, info, warn};

use super::{Dialer, FolderUpdate, MailProtocol};
use crate::capability::Capabilities;
use crate::config::{AccountConfig, Limits};
use crate::folder::{FolderItem, FolderStatus, INBOX};
use crate::message::{FetchedMessage, FolderMessage, MessageFlags, MessageRange, MessageToken};
use crate::{Error, Result};

#[derive(Debug)]
struct Selected {
    path: String,
    exists: u32,
}

/// [`MailProtocol`] over IMAP.
pub struct ImapProtocol<D: Dialer> {
    dialer: D,
    account: AccountConfig,
    limits: Limits,
    client: Option<ImapClient<D::Stream>>,
    selected: Option<Selected>,
    capabilities: Capabilities,
}

impl<D: Dialer> std::fmt::Debug for ImapProtocol<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapProtocol")
            .field("host", &self.account.host)
            .field("open", &self.client.is_some())
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl<D: Dialer> ImapProtocol<D> {
    /// Creates a closed adapter.
    pub fn new(dialer: D, account: AccountConfig, limits: Limits) -> Self {
        Self {
            dialer,
            account,
            limits,
            client: None,
            selected: None,
            capabilities: Capabilities::default(),
        }
    }

    /// Currently selected mailbox.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_ref().map(|s| s.path.as_str())
    }

    /// The client, out of IDLE.
    async fn client(&mut self) -> Result<&mut ImapClient<D::Stream>> {
        let client = self.client.as_mut().ok_or(Error::NotOpen)?;
        if client.is_idle() {
            let events = client.done().await?;
            apply_events(self.selected.as_mut(), &events);
        }
        Ok(client)
    }

    /// Selects `folder` unless it already is. `refresh` selects again to
    /// pick up a fresh message count.
    async fn select(&mut self, folder: &str, refresh: bool) -> Result<u32> {
        let current = self
            .selected
            .as_ref()
            .filter(|s| s.path == folder && !refresh)
            .map(|s| s.exists);
        let client = self.client().await?;
        if let Some(exists) = current {
            return Ok(exists);
        }
        let status = client.select(folder).await?;
        self.selected = Some(Selected {
            path: folder.to_string(),
            exists: status.exists,
        });
        Ok(status.exists)
    }

    fn seq(token: &MessageToken) -> Result<u32> {
        match token {
            MessageToken::Imap { seq } => Ok(*seq),
            MessageToken::Pop3 { .. } => Err(Error::WrongProtocol),
        }
    }

    async fn store_deleted(
        &mut self,
        folder: &str,
        token: &MessageToken,
        action: StoreAction,
    ) -> Result<()> {
        let seq = Self::seq(token)?;
        let exists = self.select(folder, false).await?;
        if seq == 0 || seq > exists {
            return Err(Error::StaleToken(token.to_string()));
        }
        let client = self.client().await?;
        client.store_flags(seq, action, &[Flag::Deleted]).await?;
        debug!(folder, seq, action = action.as_str(), "stored \\Deleted");
        Ok(())
    }
}

impl<D: Dialer> MailProtocol for ImapProtocol<D> {
    async fn open(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }
        info!(
            host = %self.account.host,
            port = self.account.port,
            security = ?self.account.security,
            device_routing = self.account.device_routing,
            "opening IMAP connection"
        );

        let conn = self
            .dialer
            .dial(&self.account, self.limits.connect_timeout)
            .await?;
        let mut client = ImapClient::new(conn);
        client.greeting().await?;

        if self.account.security == Security::StartTls {
            if client.capabilities().is_empty() {
                client.capability().await?;
            }
            if !client.has_capability("STARTTLS") {
                return Err(Error::Imap(pocketmail_imap::Error::Protocol(
                    "server does not offer STARTTLS".to_string(),
                )));
            }
            client = client.starttls(&self.account.host).await?;
        }

        let credentials = &self.account.credentials;
        client
            .login(&credentials.username, &credentials.password)
            .await?;
        client.capability().await?;

        self.capabilities = Capabilities::from_imap(client.capabilities());
        self.client = Some(client);
        self.selected = None;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut client) = self.client.take() else {
            return Ok(());
        };
        if client.is_idle() {
            client.done().await?;
        }
        if self.selected.take().is_some() {
            client.close().await?;
        }
        client.logout().await?;
        info!(host = %self.account.host, "IMAP connection closed");
        Ok(())
    }

    fn force_close(&mut self) {
        if self.client.take().is_some() {
            warn!(host = %self.account.host, "IMAP connection dropped");
        }
        self.selected = None;
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn folder_tree(&mut self) -> Result<FolderItem> {
        let max_depth = self.limits.imap_max_folder_depth.max(1);
        let client = self.client().await?;

        let mut root = FolderItem::root();
        let mut level = client.list("", "%").await?;
        let mut depth = 1;
        loop {
            let mut patterns = Vec::new();
            for entry in &level {
                root.insert(&entry.name, entry.delimiter, entry.can_select);
                if entry.has_children
                    && depth < max_depth
                    && let Some(delimiter) = entry.delimiter
                {
                    patterns.push(format!("{}{delimiter}%", entry.name));
                }
            }
            if patterns.is_empty() {
                break;
            }

            let mut next = Vec::new();
            for pattern in &patterns {
                next.extend(client.list("", pattern).await?);
            }
            level = next;
            depth += 1;
        }

        debug!(folders = root.descendant_count(), depth, "folder tree built");
        Ok(root)
    }

    async fn folder_status(&mut self, path: &str) -> Result<FolderStatus> {
        let client = self.client().await?;
        let status = client.status(path).await?;
        Ok(FolderStatus {
            messages: status.messages,
            unseen: Some(status.unseen),
        })
    }

    async fn fetch_messages(
        &mut self,
        folder: &str,
        range: MessageRange,
    ) -> Result<Vec<FolderMessage>> {
        let max = self.limits.max_retrieved_headers;
        let exists = self.select(folder, true).await?;
        let Some(range) = range.clip(exists, max) else {
            return Ok(Vec::new());
        };

        let client = self.client().await?;
        let fetched = client
            .fetch(
                &format!("{}:{}", range.start(), range.end()),
                &[FetchAttribute::Flags, FetchAttribute::Envelope],
            )
            .await?;

        Ok(fetched
            .iter()
            .map(|response| FolderMessage {
                token: MessageToken::Imap { seq: response.seq },
                envelope: response.envelope_or_placeholder(),
                flags: response
                    .flags()
                    .map(|flags| message_flags(&flags))
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn fetch_message(&mut self, folder: &str, token: &MessageToken) -> Result<FetchedMessage> {
        let seq = Self::seq(token)?;
        let budget = self.limits.imap_max_message_size;
        self.select(folder, false).await?;
        let client = self.client().await?;
        let set = seq.to_string();

        let structure = client
            .fetch(&set, &[FetchAttribute::Envelope, FetchAttribute::BodyStructure])
            .await?
            .into_iter()
            .find(|response| response.seq == seq)
            .ok_or_else(|| Error::StaleToken(token.to_string()))?;
        let envelope = structure.envelope_or_placeholder();
        let root = structure.body_structure()?;

        let (sections, truncated) = sections_within(&root, budget);
        let mut contents = PartContents::new();
        if !sections.is_empty() {
            let items: Vec<_> = sections
                .iter()
                .map(|id| FetchAttribute::body_peek(id.as_str()))
                .collect();
            for response in client.fetch(&set, &items).await? {
                if response.seq != seq {
                    continue;
                }
                for id in &sections {
                    if let (Some(raw), Some(part)) = (response.body(id.as_str()), root.find(id)) {
                        contents.insert(id.clone(), decode_section(part, raw));
                    }
                }
            }
        }

        Ok(FetchedMessage {
            token: token.clone(),
            envelope,
            root,
            contents,
            truncated,
        })
    }

    async fn delete(&mut self, folder: &str, token: &MessageToken) -> Result<()> {
        self.store_deleted(folder, token, StoreAction::Add).await
    }

    async fn undelete(&mut self, folder: &str, token: &MessageToken) -> Result<()> {
        self.store_deleted(folder, token, StoreAction::Remove).await
    }

    async fn idle_begin(&mut self) -> Result<bool> {
        if !self.capabilities.contains("IDLE") {
            debug!("server cannot IDLE, ignoring");
            return Ok(false);
        }
        if self.client.as_ref().is_some_and(ImapClient::is_idle) {
            return Ok(true);
        }
        if self.selected.is_none() {
            self.select(INBOX, false).await?;
        }
        let client = self.client.as_mut().ok_or(Error::NotOpen)?;
        client.idle().await?;
        Ok(true)
    }

    async fn idle_poll(&mut self, wait: Duration) -> Result<Option<FolderUpdate>> {
        let client = self.client.as_mut().ok_or(Error::NotOpen)?;
        if !client.is_idle() {
            return Ok(None);
        }
        let Some(event) = client.poll_idle(wait).await? else {
            return Ok(None);
        };
        Ok(apply_events(self.selected.as_mut(), &[event]))
    }

    async fn idle_end(&mut self) -> Result<()> {
        let client = self.client.as_mut().ok_or(Error::NotOpen)?;
        if client.is_idle() {
            let events = client.done().await?;
            apply_events(self.selected.as_mut(), &events);
        }
        Ok(())
    }

    async fn noop(&mut self) -> Result<Option<FolderUpdate>> {
        let client = self.client.as_mut().ok_or(Error::NotOpen)?;
        if client.is_idle() {
            return Ok(None);
        }
        let events = client.noop().await?;
        Ok(apply_events(self.selected.as_mut(), &events))
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}

/// Tracks EXISTS and EXPUNGE for the selected mailbox; returns the new
/// count if it changed.
fn apply_events(selected: Option<&mut Selected>, events: &[MailboxEvent]) -> Option<FolderUpdate> {
    let selected = selected?;
    let before = selected.exists;
    for event in events {
        match event {
            MailboxEvent::Exists(n) => selected.exists = *n,
            MailboxEvent::Expunge(_) => selected.exists = selected.exists.saturating_sub(1),
            MailboxEvent::Recent(_) | MailboxEvent::Flags { .. } => {}
        }
    }
    (selected.exists != before).then(|| FolderUpdate {
        folder: selected.path.clone(),
        messages: selected.exists,
    })
}

/// Leaf sections whose combined size fits `budget`, in tree order, and
/// whether any had to be left out.
fn sections_within(root: &MessagePart, budget: usize) -> (Vec<PartId>, bool) {
    let mut used = 0usize;
    let mut truncated = false;
    let mut sections = Vec::new();
    for id in root.leaf_ids() {
        let size = root.find(&id).map_or(0, MessagePart::size);
        if used.saturating_add(size) > budget {
            truncated = true;
            continue;
        }
        used += size;
        sections.push(id);
    }
    (sections, truncated)
}

fn message_flags(flags: &Flags) -> MessageFlags {
    MessageFlags {
        seen: flags.contains(&Flag::Seen),
        answered: flags.contains(&Flag::Answered),
        flagged: flags.contains(&Flag::Flagged),
        deleted: flags.contains(&Flag::Deleted),
        draft: flags.contains(&Flag::Draft),
        recent: flags.contains(&Flag::Recent),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pocketmail_mime::PLACEHOLDER_SUBJECT;
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::config::Credentials;
    use crate::protocol::testing::ScriptedDialer;

    fn account() -> AccountConfig {
        AccountConfig::imap("imap.example.com", Credentials::new("ann", "secret"))
    }

    fn login(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"* OK IMAP4rev1 ready\r\n")
            .write(b"A0 LOGIN \"ann\" \"secret\"\r\n")
            .read(b"A0 OK logged in\r\n")
            .write(b"A1 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 IDLE\r\nA1 OK done\r\n")
    }

    fn protocol(mock: Mock, limits: Limits) -> ImapProtocol<ScriptedDialer> {
        ImapProtocol::new(ScriptedDialer::new([mock]), account(), limits)
    }

    #[tokio::test]
    async fn test_open_and_tree() {
        let mock = login(&mut Builder::new())
            .write(b"A2 LIST \"\" \"%\"\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n")
            .read(b"* LIST (\\Noselect \\HasChildren) \"/\" Work\r\n")
            .read(b"* LIST (\\HasChildren) \"/\" Archive\r\n")
            .read(b"A2 OK done\r\n")
            .write(b"A3 LIST \"\" \"Work/%\"\r\n")
            .read(b"* LIST (\\HasChildren) \"/\" Work/Projects\r\n")
            .read(b"A3 OK done\r\n")
            .write(b"A4 LIST \"\" \"Archive/%\"\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" Archive/2023\r\n")
            .read(b"A4 OK done\r\n")
            .build();
        let limits = Limits {
            imap_max_folder_depth: 2,
            ..Limits::default()
        };
        let mut imap = protocol(mock, limits);

        imap.open().await.unwrap();
        assert!(imap.is_open());
        assert!(imap.capabilities().contains("IDLE"));

        let tree = imap.folder_tree().await.unwrap();
        assert_eq!(
            tree.selectable_paths(),
            vec!["INBOX", "Work/Projects", "Archive", "Archive/2023"]
        );
        let work = tree.find("Work").unwrap();
        assert!(!work.selectable);
        assert_eq!(work.children().len(), 1);
        // depth limit reached: Work/Projects is not listed further
        assert!(tree.find("Work/Projects").unwrap().children().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_messages_clips_to_newest() {
        let mock = login(&mut Builder::new())
            .write(b"A2 SELECT \"INBOX\"\r\n")
            .read(b"* 10 EXISTS\r\nA2 OK [READ-WRITE] done\r\n")
            .write(b"A3 FETCH 9:10 (FLAGS ENVELOPE)\r\n")
            .read(b"* 9 FETCH (FLAGS (\\Seen) ENVELOPE (NIL \"short\" NIL))\r\n")
            .read(b"* 10 FETCH (FLAGS (\\Deleted) ENVELOPE (NIL \"ok\" ((NIL NIL \"bob\" \"example.com\")) NIL NIL NIL NIL NIL NIL NIL))\r\n")
            .read(b"A3 OK done\r\n")
            .build();
        let limits = Limits {
            max_retrieved_headers: 2,
            ..Limits::default()
        };
        let mut imap = protocol(mock, limits);
        imap.open().await.unwrap();

        let messages = imap.fetch_messages(INBOX, MessageRange::Newest).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].token, MessageToken::Imap { seq: 9 });
        assert_eq!(messages[0].envelope.subject, PLACEHOLDER_SUBJECT);
        assert!(messages[0].flags.seen);
        assert_eq!(messages[1].envelope.from, vec!["bob@example.com"]);
        assert!(messages[1].flags.deleted);
        assert_eq!(imap.selected(), Some(INBOX));
    }

    #[tokio::test]
    async fn test_fetch_message_respects_size_budget() {
        let mock = login(&mut Builder::new())
            .write(b"A2 SELECT \"INBOX\"\r\n")
            .read(b"* 1 EXISTS\r\nA2 OK done\r\n")
            .write(b"A3 FETCH 1 (ENVELOPE BODYSTRUCTURE)\r\n")
            .read(b"* 1 FETCH (ENVELOPE (NIL \"hi\" NIL NIL NIL NIL NIL NIL NIL NIL) BODYSTRUCTURE ((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"BASE64\" 8 1)(\"APPLICATION\" \"PDF\" NIL NIL NIL \"BASE64\" 90000) \"MIXED\"))\r\n")
            .read(b"A3 OK done\r\n")
            .write(b"A4 FETCH 1 BODY.PEEK[1]\r\n")
            .read(b"* 1 FETCH (BODY[1] \"aGVsbG8=\")\r\nA4 OK done\r\n")
            .build();
        let limits = Limits {
            imap_max_message_size: 1024,
            ..Limits::default()
        };
        let mut imap = protocol(mock, limits);
        imap.open().await.unwrap();
        imap.select(INBOX, false).await.unwrap();

        let message = imap
            .fetch_message(INBOX, &MessageToken::Imap { seq: 1 })
            .await
            .unwrap();
        assert_eq!(message.envelope.subject, "hi");
        assert!(message.truncated);
        assert_eq!(message.contents.get(&PartId::new("1")), Some(&b"hello"[..]));
        assert!(!message.contents.contains(&PartId::new("2")));
    }

    #[tokio::test]
    async fn test_delete_and_undelete_store_flags() {
        let mock = login(&mut Builder::new())
            .write(b"A2 SELECT \"INBOX\"\r\n")
            .read(b"* 3 EXISTS\r\nA2 OK done\r\n")
            .write(b"A3 STORE 2 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A3 OK done\r\n")
            .write(b"A4 STORE 2 -FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A4 OK done\r\n")
            .build();
        let mut imap = protocol(mock, Limits::default());
        imap.open().await.unwrap();

        let token = MessageToken::Imap { seq: 2 };
        imap.delete(INBOX, &token).await.unwrap();
        imap.undelete(INBOX, &token).await.unwrap();

        let stale = MessageToken::Imap { seq: 9 };
        assert!(matches!(imap.delete(INBOX, &stale).await, Err(Error::StaleToken(_))));
        let pop = MessageToken::Pop3 { index: 1, uid: None };
        assert!(matches!(imap.delete(INBOX, &pop).await, Err(Error::WrongProtocol)));
    }

    #[tokio::test]
    async fn test_idle_reports_new_count() {
        let mock = login(&mut Builder::new())
            .write(b"A2 SELECT \"INBOX\"\r\n")
            .read(b"* 4 EXISTS\r\nA2 OK done\r\n")
            .write(b"A3 IDLE\r\n")
            .read(b"+ idling\r\n")
            .read(b"* 5 EXISTS\r\n")
            .write(b"DONE\r\n")
            .read(b"A3 OK IDLE terminated\r\n")
            .build();
        let mut imap = protocol(mock, Limits::default());
        imap.open().await.unwrap();

        assert!(imap.idle_begin().await.unwrap());
        let update = imap.idle_poll(Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            update,
            Some(FolderUpdate {
                folder: INBOX.to_string(),
                messages: 5
            })
        );
        imap.idle_end().await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_need_open_connection() {
        let mut imap = protocol(Builder::new().build(), Limits::default());
        assert!(matches!(imap.folder_tree().await, Err(Error::NotOpen)));
        assert!(matches!(imap.noop().await, Err(Error::NotOpen)));
        imap.close().await.unwrap();
    }

    #[test]
    fn test_sections_within() {
        let root = MessagePart::Multipart(
            pocketmail_mime::Multipart::new(PartId::root(), pocketmail_mime::MultipartKind::Mixed)
                .with_child(MessagePart::leaf(
                    PartId::new("1"),
                    "text",
                    "plain",
                    None,
                    pocketmail_mime::TransferEncoding::SevenBit,
                    600,
                ))
                .with_child(MessagePart::leaf(
                    PartId::new("2"),
                    "image",
                    "png",
                    None,
                    pocketmail_mime::TransferEncoding::Base64,
                    600,
                )),
        );
        let (sections, truncated) = sections_within(&root, 1000);
        assert_eq!(sections, vec![PartId::new("1")]);
        assert!(truncated);

        let (sections, truncated) = sections_within(&root, 1200);
        assert_eq!(sections.len(), 2);
        assert!(!truncated);
    }
}
