// ── Board session ──
//
// Lifecycle owner for one open board: initial load, the reconciler
// task, the realtime socket and the forwarder that turns inbound
// notifications into refetches.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use boardsync_api::websocket::board_socket_url;
use boardsync_api::{ApiClient, SyncHandle, SyncMessage, SyncState};

use crate::backend::BoardBackend;
use crate::command::{BoardCommand, CommandEnvelope, CommandOutcome};
use crate::config::SessionConfig;
use crate::drag::MoveIntent;
use crate::error::CoreError;
use crate::model::Board;
use crate::notice::{Notice, Notices};
use crate::reconciler::Reconciler;
use crate::store::BoardStore;
use crate::stream::BoardStream;

const COMMAND_CHANNEL_SIZE: usize = 64;

/// The main entry point for consumers.
///
/// Cheaply cloneable. Call [`open()`](Self::open) to load the board and
/// start background tasks, and [`close()`](Self::close) to stop them.
#[derive(Clone)]
pub struct BoardSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    store: Arc<BoardStore>,
    backend: Arc<dyn BoardBackend>,
    notices: Notices,
    sync_state: watch::Sender<SyncState>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    sync: Mutex<Option<SyncHandle>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BoardSession {
    /// Build a session talking to the configured REST API. Does not
    /// connect; call [`open()`](Self::open).
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        let client = ApiClient::new(config.api_url.clone(), &config.transport())?;
        Ok(Self::with_backend(config, Arc::new(client)))
    }

    /// Build a session over any backend.
    pub fn with_backend(config: SessionConfig, backend: Arc<dyn BoardBackend>) -> Self {
        let store = Arc::new(BoardStore::new(config.board_id.clone()));
        let (sync_state, _) = watch::channel(SyncState::Closed);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(SessionInner {
                config,
                store,
                backend,
                notices: Notices::new(),
                sync_state,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                sync: Mutex::new(None),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Load the board and start the background tasks.
    ///
    /// Socket URL and load errors propagate and leave nothing running
    /// or installed. A session can be opened once.
    pub async fn open(&self) -> Result<Arc<Board>, CoreError> {
        let config = &self.inner.config;
        let socket_url = if config.sync_enabled {
            Some(match &config.sync_url {
                Some(url) => url.clone(),
                None => board_socket_url(&config.api_url, &config.board_id)?,
            })
        } else {
            None
        };

        let mut command_rx = self.inner.command_rx.lock().await;
        if command_rx.is_none() {
            return Err(CoreError::illegal("board session was already opened"));
        }

        let board = self.inner.store.load(self.inner.backend.as_ref()).await?;

        let Some(rx) = command_rx.take() else {
            return Err(CoreError::illegal("board session was already opened"));
        };
        drop(command_rx);

        let mut reconciler = Reconciler::new(
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.backend),
            self.inner.notices.clone(),
        );
        let mut handles = self.inner.task_handles.lock().await;

        if let Some(url) = socket_url {
            info!(%url, "connecting board socket");

            let handle = SyncHandle::connect(
                url,
                config.reconnect.clone(),
                self.inner.cancel.child_token(),
                config.token.clone(),
            );
            reconciler = reconciler.with_broadcaster(Arc::new(handle.sender()));

            handles.push(tokio::spawn(forward_remote_changes(
                handle.subscribe(),
                handle.state(),
                self.inner.sync_state.clone(),
                self.inner.command_tx.clone(),
                self.inner.cancel.clone(),
            )));
            *self.inner.sync.lock().await = Some(handle);
        }

        handles.push(tokio::spawn(
            reconciler.run(rx, self.inner.cancel.clone()),
        ));

        info!(
            board = %board.name,
            columns = board.columns.len(),
            issues = board.total_issues(),
            "board session open"
        );
        Ok(board)
    }

    /// Stop background tasks and the socket.
    ///
    /// The reconciler finishes the command it is working on first.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        if let Some(sync) = self.inner.sync.lock().await.take() {
            sync.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "board session task ended abnormally");
            }
        }
        self.inner.sync_state.send_replace(SyncState::Closed);
        debug!(board = %self.inner.config.board_id, "board session closed");
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Queue a command and return its outcome receiver without waiting.
    pub async fn submit(
        &self,
        command: BoardCommand,
    ) -> Result<oneshot::Receiver<Result<CommandOutcome, CoreError>>, CoreError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command,
                response_tx,
            })
            .await
            .map_err(|_| CoreError::SessionClosed)?;
        Ok(response_rx)
    }

    /// Queue a command and wait for it to resolve.
    pub async fn execute(&self, command: BoardCommand) -> Result<CommandOutcome, CoreError> {
        let rx = self.submit(command).await?;
        rx.await.map_err(|_| CoreError::SessionClosed)?
    }

    /// Submit the move produced by a drag-and-drop drop.
    pub async fn request_move(
        &self,
        intent: MoveIntent,
    ) -> Result<oneshot::Receiver<Result<CommandOutcome, CoreError>>, CoreError> {
        self.submit(intent.into()).await
    }

    // ── Observation ──────────────────────────────────────────────

    /// Current board snapshot, if loaded.
    pub fn board(&self) -> Option<Arc<Board>> {
        self.inner.store.snapshot()
    }

    pub fn subscribe_board(&self) -> BoardStream {
        self.inner.store.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// Socket lifecycle; stays `Closed` when sync is disabled.
    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.inner.sync_state.subscribe()
    }

    pub fn store(&self) -> &Arc<BoardStore> {
        &self.inner.store
    }
}

// ── Background tasks ─────────────────────────────────────────────

async fn enqueue(commands: &mpsc::Sender<CommandEnvelope>, command: BoardCommand) -> bool {
    let (response_tx, _) = oneshot::channel();
    commands
        .send(CommandEnvelope {
            command,
            response_tx,
        })
        .await
        .is_ok()
}

/// Turn every inbound notification into a `RemoteChange` and mirror the
/// socket state. A lagged receiver counts as one change, and so does a
/// reconnect, since notifications may have been missed while offline.
pub(crate) async fn forward_remote_changes(
    mut inbound: broadcast::Receiver<Arc<SyncMessage>>,
    mut state: watch::Receiver<SyncState>,
    mirror: watch::Sender<SyncState>,
    commands: mpsc::Sender<CommandEnvelope>,
    cancel: CancellationToken,
) {
    let mut last = *state.borrow_and_update();
    mirror.send_replace(last);

    loop {
        let command = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = *state.borrow_and_update();
                mirror.send_replace(next);
                let resumed = next == SyncState::Open
                    && matches!(last, SyncState::Reconnecting { .. });
                last = next;
                if !resumed {
                    continue;
                }
                debug!("board socket resumed; refetching");
                BoardCommand::RemoteChange
            }
            msg = inbound.recv() => match msg {
                Ok(msg) => {
                    debug!(?msg, "remote board change");
                    BoardCommand::RemoteChange
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "board notifications lagged");
                    BoardCommand::RemoteChange
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        if !enqueue(&commands, command).await {
            break;
        }
    }

    mirror.send_replace(SyncState::Closed);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::model::EntityId;
    use crate::test_support::{FakeBackend, board, layout};

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    fn config() -> SessionConfig {
        let mut config = SessionConfig::new(Url::parse("http://tracker.test").unwrap(), "b1");
        config.sync_enabled = false;
        config
    }

    fn moved() -> Arc<SyncMessage> {
        Arc::new(SyncMessage::IssueMoved {
            issue_id: id("A"),
            column_id: id("done"),
            status: "done".into(),
        })
    }

    async fn open_session(backend: &Arc<FakeBackend>) -> BoardSession {
        let session = BoardSession::with_backend(config(), Arc::clone(backend) as Arc<dyn BoardBackend>);
        session.open().await.unwrap();
        session
    }

    #[tokio::test]
    async fn open_loads_and_executes_commands() {
        let backend = Arc::new(FakeBackend::new(board(&[("todo", &["A"]), ("done", &[])])));
        let session = open_session(&backend).await;

        let outcome = session
            .execute(BoardCommand::MoveIssue {
                issue_id: id("A"),
                from: id("todo"),
                to: id("done"),
            })
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Moved);
        assert_eq!(session.board().unwrap().columns[1].issue_count, 1);
        assert_eq!(*session.sync_state().borrow(), SyncState::Closed);
        session.close().await;
    }

    #[tokio::test]
    async fn failed_open_starts_nothing() {
        let backend = Arc::new(FakeBackend::new(board(&[("todo", &["A"])])));
        backend.fail_loads(true);
        let session = BoardSession::with_backend(config(), Arc::clone(&backend) as Arc<dyn BoardBackend>);

        let err = session.open().await.unwrap_err();

        assert!(matches!(err, CoreError::Network { .. }));
        assert!(session.board().is_none());
        assert!(session.inner.task_handles.lock().await.is_empty());

        // The session can be retried once the server is back.
        backend.fail_loads(false);
        session.open().await.unwrap();
        assert!(session.open().await.unwrap_err().is_illegal_state());
        session.close().await;
    }

    #[tokio::test]
    async fn bad_socket_url_fails_before_loading() {
        let backend = Arc::new(FakeBackend::new(board(&[("todo", &["A"])])));
        let config = SessionConfig::new(Url::parse("ftp://tracker.test").unwrap(), "b1");
        assert!(config.sync_enabled);
        let session = BoardSession::with_backend(config, Arc::clone(&backend) as Arc<dyn BoardBackend>);

        let err = session.open().await.unwrap_err();

        assert!(matches!(err, CoreError::Network { .. }));
        assert_eq!(backend.load_count(), 0);
        assert!(session.board().is_none());
        assert!(session.inner.task_handles.lock().await.is_empty());
        assert!(session.inner.command_rx.lock().await.is_some());
    }

    #[tokio::test]
    async fn request_move_resolves_through_queue() {
        let backend = Arc::new(FakeBackend::new(board(&[("todo", &["A"]), ("in_review", &[])])));
        let session = open_session(&backend).await;

        let rx = session
            .request_move(MoveIntent {
                issue_id: id("A"),
                from: id("todo"),
                to: id("in_review"),
            })
            .await
            .unwrap();

        assert_eq!(rx.await.unwrap().unwrap(), CommandOutcome::Moved);
        assert_eq!(
            layout(&session.board().unwrap()),
            vec![
                ("todo".to_string(), vec![]),
                ("in_review".to_string(), vec!["A".to_string()]),
            ]
        );
        session.close().await;
    }

    #[tokio::test]
    async fn commands_after_close_fail() {
        let backend = Arc::new(FakeBackend::new(board(&[("todo", &["A"])])));
        let session = open_session(&backend).await;
        session.close().await;

        let err = session.execute(BoardCommand::Refresh).await.unwrap_err();
        assert!(matches!(err, CoreError::SessionClosed));
    }

    // ── Forwarder ──────────────────────────────────────────────────

    struct Forwarder {
        inbound: broadcast::Sender<Arc<SyncMessage>>,
        state: watch::Sender<SyncState>,
        mirror: watch::Receiver<SyncState>,
        commands: mpsc::Receiver<CommandEnvelope>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    }

    fn spawn_forwarder(inbound_rx: broadcast::Receiver<Arc<SyncMessage>>, inbound: broadcast::Sender<Arc<SyncMessage>>) -> Forwarder {
        let (state, state_rx) = watch::channel(SyncState::Open);
        let (mirror_tx, mirror) = watch::channel(SyncState::Closed);
        let (commands_tx, commands) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(forward_remote_changes(
            inbound_rx,
            state_rx,
            mirror_tx,
            commands_tx,
            cancel.clone(),
        ));
        Forwarder {
            inbound,
            state,
            mirror,
            commands,
            cancel,
            task,
        }
    }

    async fn next_command(rx: &mut mpsc::Receiver<CommandEnvelope>) -> BoardCommand {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
            .command
    }

    #[tokio::test]
    async fn each_notification_becomes_one_remote_change() {
        let (tx, rx) = broadcast::channel(16);
        let mut f = spawn_forwarder(rx, tx);

        f.inbound.send(moved()).unwrap();
        assert_eq!(next_command(&mut f.commands).await, BoardCommand::RemoteChange);
        tokio::task::yield_now().await;
        assert!(f.commands.try_recv().is_err());

        f.cancel.cancel();
        f.task.await.unwrap();
    }

    #[tokio::test]
    async fn lagged_receiver_counts_as_one_change() {
        let (tx, rx) = broadcast::channel(1);
        // Overflow before the forwarder starts: lag of 2, then one message.
        for _ in 0..3 {
            tx.send(moved()).unwrap();
        }
        let mut f = spawn_forwarder(rx, tx);

        assert_eq!(next_command(&mut f.commands).await, BoardCommand::RemoteChange);
        assert_eq!(next_command(&mut f.commands).await, BoardCommand::RemoteChange);
        tokio::task::yield_now().await;
        assert!(f.commands.try_recv().is_err());

        f.cancel.cancel();
        f.task.await.unwrap();
    }

    #[tokio::test]
    async fn reconnect_triggers_refetch_and_state_is_mirrored() {
        let (tx, rx) = broadcast::channel(16);
        let mut f = spawn_forwarder(rx, tx);

        f.state.send_replace(SyncState::Reconnecting { attempt: 1 });
        tokio::time::timeout(
            Duration::from_secs(5),
            f.mirror.wait_for(|s| matches!(s, SyncState::Reconnecting { .. })),
        )
        .await
        .unwrap()
        .unwrap();

        f.state.send_replace(SyncState::Open);
        assert_eq!(next_command(&mut f.commands).await, BoardCommand::RemoteChange);
        assert_eq!(*f.mirror.borrow(), SyncState::Open);

        f.cancel.cancel();
        f.task.await.unwrap();
        assert_eq!(*f.mirror.borrow(), SyncState::Closed);
    }

    #[tokio::test]
    async fn remote_notification_reloads_once() {
        let backend = Arc::new(FakeBackend::new(board(&[("todo", &["A"]), ("done", &[])])));
        let session = open_session(&backend).await;
        backend.set_remote(board(&[("todo", &[]), ("done", &["A"])]));

        let (tx, rx) = broadcast::channel(16);
        let (_state_tx, state_rx) = watch::channel(SyncState::Open);
        let (mirror, _) = watch::channel(SyncState::Closed);
        let cancel = CancellationToken::new();
        let forwarder = tokio::spawn(forward_remote_changes(
            rx,
            state_rx,
            mirror,
            session.inner.command_tx.clone(),
            cancel.clone(),
        ));

        let mut stream = session.subscribe_board();
        tx.send(moved()).unwrap();
        let reloaded = tokio::time::timeout(Duration::from_secs(5), stream.changed())
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(reloaded.columns[1].issue_count, 1);
        // A queued refresh resolves only after the remote change did.
        session.execute(BoardCommand::Refresh).await.unwrap();
        assert_eq!(backend.load_count(), 3);

        cancel.cancel();
        forwarder.await.unwrap();
        session.close().await;
    }
}
