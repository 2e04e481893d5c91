//! Events and their delivery.
//!
//! The worker never calls listeners itself. Each event is wrapped in a
//! [`Delivery`] and handed to the [`EventDispatcher`] the embedder chose,
//! which runs it on whatever context owns the listeners (a UI loop, say).

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::FailureKind;
use crate::folder::{FolderItem, FolderStatus};
use crate::message::{FetchedMessage, FolderMessage, MessageToken};

/// Kind of a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Open the connection.
    Open,
    /// Rebuild the folder tree.
    ListFolders,
    /// Read folder counters.
    RefreshStatus,
    /// List a folder's messages.
    FetchMessages,
    /// Download one message.
    FetchMessage,
    /// Mark a message deleted.
    Delete,
    /// Clear a deleted mark.
    Undelete,
    /// Start IDLE.
    IdleBegin,
    /// Stop IDLE.
    IdleEnd,
    /// Wait for an IDLE push.
    IdlePoll,
    /// Keepalive.
    Noop,
}

impl RequestKind {
    /// Name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::ListFolders => "list_folders",
            Self::RefreshStatus => "refresh_status",
            Self::FetchMessages => "fetch_messages",
            Self::FetchMessage => "fetch_message",
            Self::Delete => "delete",
            Self::Undelete => "undelete",
            Self::IdleBegin => "idle_begin",
            Self::IdleEnd => "idle_end",
            Self::IdlePoll => "idle_poll",
            Self::Noop => "noop",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailEvent {
    /// The folder tree was (re)built.
    FolderTreeUpdated {
        /// The new tree.
        tree: FolderItem,
    },
    /// A folder listing is ready.
    FolderMessagesAvailable {
        /// Folder path.
        folder: String,
        /// Listed messages, oldest first.
        messages: Vec<FolderMessage>,
    },
    /// Counters of one or more folders changed or were refreshed.
    FolderStatusChanged {
        /// New counters by folder path.
        folders: BTreeMap<String, FolderStatus>,
    },
    /// A message was downloaded.
    MessageAvailable {
        /// Folder path.
        folder: String,
        /// The message.
        message: Box<FetchedMessage>,
    },
    /// A message was marked deleted.
    MessageDeleted {
        /// Folder path.
        folder: String,
        /// The message.
        token: MessageToken,
    },
    /// A deleted mark was cleared.
    MessageUndeleted {
        /// Folder path.
        folder: String,
        /// The message.
        token: MessageToken,
    },
    /// A request failed.
    RequestFailed {
        /// What was asked for.
        request: RequestKind,
        /// Failure class.
        kind: FailureKind,
        /// Human-readable description.
        message: String,
    },
}

/// Receives events on the delivery context.
pub trait MailListener: Send + Sync {
    /// Called once per event, in request order.
    fn on_event(&self, event: &MailEvent);
}

/// Work that hands one event to the registered listeners.
pub type Delivery = Box<dyn FnOnce() + Send>;

/// Runs deliveries on the embedder's chosen context.
pub trait EventDispatcher: Send + Sync + 'static {
    /// Schedules a delivery. Must not run listeners on the caller's task
    /// unless the embedder accepts that.
    fn dispatch(&self, delivery: Delivery);
}

/// Dispatcher that queues deliveries for an [`EventQueue`].
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl QueueDispatcher {
    /// Creates a dispatcher and the queue its deliveries land in.
    #[must_use]
    pub fn channel() -> (Self, EventQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, EventQueue { rx })
    }
}

impl EventDispatcher for QueueDispatcher {
    fn dispatch(&self, delivery: Delivery) {
        if self.tx.send(delivery).is_err() {
            debug!("event queue dropped, discarding event");
        }
    }
}

/// Pending deliveries, drained by the UI loop.
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.rx.len())
            .finish()
    }
}

impl EventQueue {
    /// Runs every delivery queued so far; returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            delivery();
            ran += 1;
        }
        ran
    }

    /// Waits for one delivery and runs it. Returns false once every
    /// dispatcher is gone.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(delivery) => {
                delivery();
                true
            }
            None => false,
        }
    }

    /// Runs deliveries until every dispatcher is gone.
    pub async fn run(&mut self) {
        while self.run_next().await {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_queue_runs_only_when_drained() {
        let (dispatcher, mut queue) = QueueDispatcher::channel();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            dispatcher.dispatch(Box::new(move || seen.lock().unwrap().push(i)));
        }
        assert!(seen.lock().unwrap().is_empty());

        assert_eq!(queue.run_pending(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(queue.run_pending(), 0);
    }

    #[tokio::test]
    async fn test_run_ends_with_dispatchers() {
        let (dispatcher, mut queue) = QueueDispatcher::channel();
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        dispatcher.dispatch(Box::new(move || *counter.lock().unwrap() += 1));
        drop(dispatcher);

        queue.run().await;
        assert_eq!(*seen.lock().unwrap(), 1);
        assert!(!queue.run_next().await);
    }

    #[test]
    fn test_request_kind_names() {
        assert_eq!(RequestKind::FetchMessages.to_string(), "fetch_messages");
        assert_eq!(RequestKind::IdlePoll.as_str(), "idle_poll");
    }
}
