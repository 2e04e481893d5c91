//! Connection handler: one worker task per account draining a request queue.
//!
//! Callers only enqueue. The worker owns the protocol adapter, runs one
//! request at a time in arrival order, and reports every outcome as a
//! [`MailEvent`] through the embedder's [`EventDispatcher`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capability::Capabilities;
use crate::config::{AccountConfig, Limits};
use crate::event::{EventDispatcher, MailEvent, MailListener, RequestKind};
use crate::folder::{FolderItem, FolderStatus, INBOX};
use crate::message::{FolderMessage, MessageRange, MessageToken};
use crate::protocol::{FolderUpdate, MailProtocol, ProtocolFactory};
use crate::{Error, Result};

/// Pause before the single reconnect attempt.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Upper bound on the goodbye exchange during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a request already running may continue after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of a handler's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Closed,
    /// Connecting and logging in.
    Opening,
    /// Connected and waiting for work.
    Open,
    /// Running a request.
    Busy,
    /// Logging out.
    Closing,
    /// The worker has exited.
    ShutDown,
}

/// A queued unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Connect and publish the folder tree.
    Open,
    /// Rebuild the folder tree.
    ListFolders,
    /// Read counters of these folders; empty means every selectable folder.
    RefreshStatus {
        /// Folder paths.
        paths: Vec<String>,
    },
    /// List a range of a folder.
    FetchMessages {
        /// Folder path.
        folder: String,
        /// Which messages.
        range: MessageRange,
    },
    /// Download one message.
    FetchMessage {
        /// Folder path.
        folder: String,
        /// The message.
        token: MessageToken,
    },
    /// Mark a message deleted.
    Delete {
        /// Folder path.
        folder: String,
        /// The message.
        token: MessageToken,
    },
    /// Clear a deleted mark.
    Undelete {
        /// Folder path.
        folder: String,
        /// The message.
        token: MessageToken,
    },
    /// Start IDLE.
    IdleBegin,
    /// Stop IDLE.
    IdleEnd,
    /// Wait for one IDLE push.
    IdlePoll {
        /// How long to wait.
        wait: Duration,
    },
    /// Keepalive.
    Noop,
}

impl Request {
    /// The request's kind, as reported in failures.
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::Open => RequestKind::Open,
            Self::ListFolders => RequestKind::ListFolders,
            Self::RefreshStatus { .. } => RequestKind::RefreshStatus,
            Self::FetchMessages { .. } => RequestKind::FetchMessages,
            Self::FetchMessage { .. } => RequestKind::FetchMessage,
            Self::Delete { .. } => RequestKind::Delete,
            Self::Undelete { .. } => RequestKind::Undelete,
            Self::IdleBegin => RequestKind::IdleBegin,
            Self::IdleEnd => RequestKind::IdleEnd,
            Self::IdlePoll { .. } => RequestKind::IdlePoll,
            Self::Noop => RequestKind::Noop,
        }
    }
}

/// The most recently listed folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFolder {
    /// Folder path.
    pub path: String,
    /// Listed messages, flags kept current by delete and undelete.
    pub messages: Vec<FolderMessage>,
}

impl ActiveFolder {
    fn message_mut(&mut self, token: &MessageToken) -> Option<&mut FolderMessage> {
        self.messages.iter_mut().find(|m| &m.token == token)
    }
}

#[derive(Debug, Clone)]
struct Settings {
    account: AccountConfig,
    limits: Limits,
}

type Listeners = Arc<RwLock<Vec<Arc<dyn MailListener>>>>;

/// State shared between the handle and its worker.
struct Shared {
    state: watch::Sender<ConnectionState>,
    folder_tree: RwLock<Option<FolderItem>>,
    active_folder: RwLock<Option<ActiveFolder>>,
    capabilities: RwLock<Capabilities>,
    listeners: Listeners,
    dispatcher: Arc<dyn EventDispatcher>,
    settings: Mutex<Settings>,
    pending: Mutex<Option<Settings>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "connection state");
        }
    }

    /// Hands the event to the dispatcher. Listeners are read when the
    /// delivery runs, not when it is queued.
    fn publish(&self, event: MailEvent) {
        let listeners = Arc::clone(&self.listeners);
        self.dispatcher.dispatch(Box::new(move || {
            let listeners = listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for listener in &listeners {
                listener.on_event(&event);
            }
        }));
    }

    /// Drops everything learned from the previous connection.
    fn reset_snapshots(&self) {
        *self
            .folder_tree
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self
            .active_folder
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self
            .capabilities
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Capabilities::default();
    }

    /// Promotes pending settings to current, returning them.
    fn take_pending(&self) -> Option<Settings> {
        let settings = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        Some(settings)
    }

    fn current_settings(&self) -> Settings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_active<R>(&self, folder: &str, f: impl FnOnce(&mut ActiveFolder) -> R) -> Option<R> {
        let mut active = self
            .active_folder
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        active.as_mut().filter(|a| a.path == folder).map(f)
    }

    /// Stores a folder's counters in the tree snapshot.
    fn record_status(&self, path: &str, status: FolderStatus) {
        let mut tree = self
            .folder_tree
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(node) = tree.as_mut().and_then(|t| t.find_mut(path)) {
            node.status = Some(status);
        }
    }

    fn known_status(&self, path: &str) -> Option<FolderStatus> {
        self.folder_tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|t| t.find(path))
            .and_then(|node| node.status)
    }
}

/// Completes when the stop flag is raised or its sender is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stop| *stop).await.is_err() {
        debug!("handler dropped, stopping worker");
    }
}

struct Worker<F: ProtocolFactory> {
    protocol: F::Protocol,
    factory: Arc<F>,
    shared: Arc<Shared>,
}

impl<F: ProtocolFactory> Worker<F> {
    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        mut stop: watch::Receiver<bool>,
    ) -> F::Protocol {
        debug!("worker started");
        loop {
            let request = tokio::select! {
                biased;
                () = stopped(&mut stop) => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            self.apply_pending_settings();
            let kind = request.kind();
            debug!(request = %kind, "running request");

            let outcome = {
                let handling = self.handle(request);
                tokio::pin!(handling);
                let finished = tokio::select! {
                    biased;
                    outcome = &mut handling => Some(outcome),
                    () = stopped(&mut stop) => None,
                };
                match finished {
                    Some(outcome) => Some(outcome),
                    None => {
                        debug!(request = %kind, "shutdown requested, letting request finish");
                        tokio::time::timeout(SHUTDOWN_GRACE, &mut handling).await.ok()
                    }
                }
            };
            match outcome {
                Some(Ok(())) => {}
                Some(Err(e)) => self.fail(kind, &e),
                None => {
                    info!(request = %kind, "request cut off by shutdown");
                    self.protocol.force_close();
                    self.fail(kind, &Error::ShutDown);
                    break;
                }
            }
            self.settle();
        }

        if self.protocol.is_open() {
            self.shared.set_state(ConnectionState::Closing);
            match tokio::time::timeout(CLOSE_TIMEOUT, self.protocol.close()).await {
                Ok(Ok(())) => debug!("connection closed"),
                Ok(Err(e)) => {
                    warn!(error = %e, "close failed");
                    self.protocol.force_close();
                }
                Err(_) => {
                    warn!("close timed out");
                    self.protocol.force_close();
                }
            }
        }
        self.shared.set_state(ConnectionState::ShutDown);
        debug!("worker stopped");
        self.protocol
    }

    fn settle(&self) {
        self.shared.set_state(if self.protocol.is_open() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        });
    }

    /// Rebuilds the adapter if settings changed and it is closed.
    fn apply_pending_settings(&mut self) {
        if self.protocol.is_open() {
            return;
        }
        if let Some(settings) = self.shared.take_pending() {
            info!(host = %settings.account.host, "applying new account settings");
            self.protocol = self.factory.build(&settings.account, &settings.limits);
        }
    }

    fn fail(&mut self, request: RequestKind, error: &Error) {
        let kind = error.kind();
        warn!(request = %request, ?kind, error = %error, "request failed");
        if error.is_connection_level() {
            self.protocol.force_close();
        }
        self.shared.publish(MailEvent::RequestFailed {
            request,
            kind,
            message: error.to_string(),
        });
    }

    /// Opens the connection if needed, retrying once after a connection
    /// level failure.
    async fn ensure_open(&mut self) -> Result<()> {
        if !self.protocol.is_open() {
            self.shared.set_state(ConnectionState::Opening);
            if let Err(e) = self.protocol.open().await {
                if !e.is_connection_level() {
                    return Err(e);
                }
                warn!(error = %e, "open failed, retrying");
                self.protocol.force_close();
                tokio::time::sleep(RECONNECT_BACKOFF).await;
                self.protocol.open().await?;
            }
            *self
                .shared
                .capabilities
                .write()
                .unwrap_or_else(PoisonError::into_inner) = self.protocol.capabilities().clone();
        }
        self.shared.set_state(ConnectionState::Busy);
        Ok(())
    }

    async fn handle(&mut self, request: Request) -> Result<()> {
        self.ensure_open().await?;
        match request {
            Request::Open | Request::ListFolders => {
                let tree = self.protocol.folder_tree().await?;
                info!(folders = tree.descendant_count(), "folder tree updated");
                *self
                    .shared
                    .folder_tree
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(tree.clone());
                self.shared.publish(MailEvent::FolderTreeUpdated { tree });
            }
            Request::RefreshStatus { paths } => self.refresh_status(paths).await?,
            Request::FetchMessages { folder, range } => {
                let messages = self.protocol.fetch_messages(&folder, range).await?;
                debug!(folder = %folder, count = messages.len(), "folder listed");
                *self
                    .shared
                    .active_folder
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(ActiveFolder {
                    path: folder.clone(),
                    messages: messages.clone(),
                });
                self.shared
                    .publish(MailEvent::FolderMessagesAvailable { folder, messages });
            }
            Request::FetchMessage { folder, token } => {
                let message = self.protocol.fetch_message(&folder, &token).await?;
                self.shared.publish(MailEvent::MessageAvailable {
                    folder,
                    message: Box::new(message),
                });
            }
            Request::Delete { folder, token } => {
                self.protocol.delete(&folder, &token).await?;
                self.shared.with_active(&folder, |active| {
                    if let Some(message) = active.message_mut(&token) {
                        message.flags.deleted = true;
                    }
                });
                self.shared.publish(MailEvent::MessageDeleted { folder, token });
            }
            Request::Undelete { folder, token } => {
                self.protocol.undelete(&folder, &token).await?;
                self.shared.with_active(&folder, |active| {
                    if let Some(message) = active.message_mut(&token) {
                        message.flags.deleted = false;
                    }
                });
                self.shared
                    .publish(MailEvent::MessageUndeleted { folder, token });
            }
            Request::IdleBegin => {
                if !self.protocol.idle_begin().await? {
                    info!("server cannot push, IDLE not started");
                }
            }
            Request::IdleEnd => self.protocol.idle_end().await?,
            Request::IdlePoll { wait } => {
                if let Some(update) = self.protocol.idle_poll(wait).await? {
                    self.folder_changed(update);
                }
            }
            Request::Noop => {
                if let Some(update) = self.protocol.noop().await? {
                    self.folder_changed(update);
                }
            }
        }
        Ok(())
    }

    async fn refresh_status(&mut self, paths: Vec<String>) -> Result<()> {
        let paths = if paths.is_empty() {
            let tree = self
                .shared
                .folder_tree
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            tree.map_or_else(
                || vec![INBOX.to_string()],
                |tree| {
                    tree.selectable_paths()
                        .into_iter()
                        .map(str::to_string)
                        .collect()
                },
            )
        } else {
            paths
        };

        let mut folders = BTreeMap::new();
        for path in paths {
            let status = self.protocol.folder_status(&path).await?;
            self.shared.record_status(&path, status);
            folders.insert(path, status);
        }
        self.shared.publish(MailEvent::FolderStatusChanged { folders });
        Ok(())
    }

    fn folder_changed(&self, update: FolderUpdate) {
        let unseen = self
            .shared
            .known_status(&update.folder)
            .and_then(|status| status.unseen);
        let status = FolderStatus {
            messages: update.messages,
            unseen,
        };
        info!(folder = %update.folder, messages = update.messages, "folder changed");
        self.shared.record_status(&update.folder, status);
        self.shared.publish(MailEvent::FolderStatusChanged {
            folders: BTreeMap::from([(update.folder, status)]),
        });
    }
}

/// Owns one account's worker and its request queue.
///
/// Must be created inside a tokio runtime. Dropping the handler stops the
/// worker, which then closes its connection in the background.
pub struct ConnectionHandler<F: ProtocolFactory> {
    shared: Arc<Shared>,
    factory: Arc<F>,
    requests: Mutex<Option<mpsc::UnboundedSender<Request>>>,
    stop: Mutex<watch::Sender<bool>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<F::Protocol>>>,
    parked: Mutex<Option<F::Protocol>>,
}

impl<F: ProtocolFactory> std::fmt::Debug for ConnectionHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandler")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<F: ProtocolFactory> ConnectionHandler<F> {
    /// Builds the adapter and starts a worker. The connection is opened by
    /// the first request.
    pub fn spawn(
        account: AccountConfig,
        limits: Limits,
        factory: F,
        dispatcher: impl EventDispatcher,
    ) -> Self {
        let protocol = factory.build(&account, &limits);
        let (state, _) = watch::channel(ConnectionState::Closed);
        let shared = Arc::new(Shared {
            state,
            folder_tree: RwLock::new(None),
            active_folder: RwLock::new(None),
            capabilities: RwLock::new(Capabilities::default()),
            listeners: Arc::default(),
            dispatcher: Arc::new(dispatcher),
            settings: Mutex::new(Settings {
                account: account.clone(),
                limits,
            }),
            pending: Mutex::new(None),
        });
        let factory = Arc::new(factory);
        let (requests, stop, handle) = start_worker(protocol, &factory, &shared);
        info!(host = %account.host, protocol = ?account.protocol, "connection handler started");

        Self {
            shared,
            factory,
            requests: Mutex::new(Some(requests)),
            stop: Mutex::new(stop),
            worker: tokio::sync::Mutex::new(Some(handle)),
            parked: Mutex::new(None),
        }
    }

    fn enqueue(&self, request: Request) -> Result<()> {
        let requests = self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sender = requests.as_ref().ok_or(Error::ShutDown)?;
        debug!(request = %request.kind(), "request queued");
        sender.send(request).map_err(|_| Error::ShutDown)
    }

    /// Queues a connect; publishes the folder tree on success.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn open(&self) -> Result<()> {
        self.enqueue(Request::Open)
    }

    /// Queues a folder tree rebuild.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn list_folders(&self) -> Result<()> {
        self.enqueue(Request::ListFolders)
    }

    /// Queues a counter refresh for `paths`, or for every selectable
    /// folder when empty.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn refresh_status(&self, paths: Vec<String>) -> Result<()> {
        self.enqueue(Request::RefreshStatus { paths })
    }

    /// Queues a folder listing.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn fetch_messages(&self, folder: impl Into<String>, range: MessageRange) -> Result<()> {
        self.enqueue(Request::FetchMessages {
            folder: folder.into(),
            range,
        })
    }

    /// Queues a message download.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn fetch_message(&self, folder: impl Into<String>, token: MessageToken) -> Result<()> {
        self.enqueue(Request::FetchMessage {
            folder: folder.into(),
            token,
        })
    }

    /// Queues a delete.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn delete(&self, folder: impl Into<String>, token: MessageToken) -> Result<()> {
        self.enqueue(Request::Delete {
            folder: folder.into(),
            token,
        })
    }

    /// Queues an undelete.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn undelete(&self, folder: impl Into<String>, token: MessageToken) -> Result<()> {
        self.enqueue(Request::Undelete {
            folder: folder.into(),
            token,
        })
    }

    /// Queues the start of IDLE.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn idle_begin(&self) -> Result<()> {
        self.enqueue(Request::IdleBegin)
    }

    /// Queues the end of IDLE.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn idle_end(&self) -> Result<()> {
        self.enqueue(Request::IdleEnd)
    }

    /// Queues a wait of up to `wait` for an IDLE push.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn idle_poll(&self, wait: Duration) -> Result<()> {
        self.enqueue(Request::IdlePoll { wait })
    }

    /// Queues a keepalive.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn noop(&self) -> Result<()> {
        self.enqueue(Request::Noop)
    }

    /// Registers a listener for every later delivery.
    pub fn add_listener(&self, listener: Arc<dyn MailListener>) {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watches state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Last published folder tree, with any counters read since.
    #[must_use]
    pub fn folder_tree(&self) -> Option<FolderItem> {
        self.shared
            .folder_tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last listed folder.
    #[must_use]
    pub fn active_folder(&self) -> Option<ActiveFolder> {
        self.shared
            .active_folder
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Features advertised on the last opened connection.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.shared
            .capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the account settings. The adapter is rebuilt with them the
    /// next time it is closed.
    pub fn update_settings(&self, account: AccountConfig, limits: Limits) {
        info!(host = %account.host, "account settings changed");
        *self
            .shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Settings { account, limits });
    }

    /// Stops accepting requests and tells the worker to finish. Queued
    /// requests are dropped. A request already running gets a short grace
    /// period to complete and publish its event; after that it is abandoned
    /// along with its socket and reported as [`MailEvent::RequestFailed`].
    /// With `wait`, returns once the worker has closed the connection. Safe
    /// to call more than once.
    pub async fn shutdown(&self, wait: bool) {
        let requests = self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if requests.is_some() {
            info!("shutting down connection handler");
            self.stop
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .send_replace(true);
        }
        drop(requests);

        if wait {
            let mut worker = self.worker.lock().await;
            self.join(&mut worker).await;
        }
    }

    /// Starts a new worker after [`shutdown`](Self::shutdown). The adapter
    /// is reused unless settings changed, in which case it is rebuilt. The
    /// folder tree, active folder and capabilities are cleared; the next
    /// request connects afresh.
    ///
    /// # Errors
    ///
    /// [`Error::Running`] if the handler was not shut down.
    pub async fn restart(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
        {
            return Err(Error::Running);
        }
        self.join(&mut worker).await;

        let parked = self
            .parked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let protocol = match (self.shared.take_pending(), parked) {
            (None, Some(protocol)) => {
                debug!("reusing protocol adapter");
                protocol
            }
            (Some(settings), _) => {
                info!(host = %settings.account.host, "rebuilding protocol adapter");
                self.factory.build(&settings.account, &settings.limits)
            }
            (None, None) => {
                let settings = self.shared.current_settings();
                info!("worker lost its adapter, rebuilding");
                self.factory.build(&settings.account, &settings.limits)
            }
        };

        self.shared.reset_snapshots();
        self.shared.set_state(ConnectionState::Closed);
        let (requests, stop, handle) = start_worker(protocol, &self.factory, &self.shared);
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner) = stop;
        *self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(requests);
        *worker = Some(handle);
        info!("connection handler restarted");
        Ok(())
    }

    /// Waits for the worker in `slot` and parks its adapter.
    async fn join(&self, slot: &mut Option<JoinHandle<F::Protocol>>) {
        let Some(handle) = slot.as_mut() else {
            return;
        };
        let joined = handle.await;
        *slot = None;
        match joined {
            Ok(protocol) => {
                *self.parked.lock().unwrap_or_else(PoisonError::into_inner) = Some(protocol);
            }
            Err(e) => {
                warn!(error = %e, "worker task failed");
                self.shared.set_state(ConnectionState::ShutDown);
            }
        }
    }
}

fn start_worker<F: ProtocolFactory>(
    protocol: F::Protocol,
    factory: &Arc<F>,
    shared: &Arc<Shared>,
) -> (
    mpsc::UnboundedSender<Request>,
    watch::Sender<bool>,
    JoinHandle<F::Protocol>,
) {
    let (requests, requests_rx) = mpsc::unbounded_channel();
    let (stop, stop_rx) = watch::channel(false);
    let worker = Worker {
        protocol,
        factory: Arc::clone(factory),
        shared: Arc::clone(shared),
    };
    let handle = tokio::spawn(worker.run(requests_rx, stop_rx));
    (requests, stop, handle)
}
