// ── Optimistic reconciler ──
//
// Resolves board commands one at a time. Moves are applied to the store
// before the server confirms them; a failed confirmation restores the
// undo snapshot, raises a notice, and reloads from the server.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use boardsync_api::SyncMessage;

use crate::backend::{BoardBackend, Broadcaster};
use crate::command::{BoardCommand, CommandEnvelope, CommandOutcome};
use crate::convert::place_created_issue;
use crate::error::CoreError;
use crate::model::{Board, EntityId};
use crate::notice::{Notice, Notices};
use crate::store::BoardStore;

pub struct Reconciler {
    store: Arc<BoardStore>,
    backend: Arc<dyn BoardBackend>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    notices: Notices,
}

impl Reconciler {
    pub fn new(store: Arc<BoardStore>, backend: Arc<dyn BoardBackend>, notices: Notices) -> Self {
        Self {
            store,
            backend,
            broadcaster: None,
            notices,
        }
    }

    /// Announce confirmed moves to other clients through `broadcaster`.
    #[must_use]
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Resolve one command to completion.
    ///
    /// An `IllegalState` failure is logged, surfaced as a notice and
    /// followed by a forced reload before the error is returned.
    pub async fn handle(&self, command: BoardCommand) -> Result<CommandOutcome, CoreError> {
        let result = match command {
            BoardCommand::MoveIssue { issue_id, from, to } => {
                self.move_issue(&issue_id, &from, &to).await
            }
            BoardCommand::CreateIssue { title } => self.create_issue(&title).await,
            BoardCommand::DeleteIssue { issue_id } => self.delete_issue(&issue_id).await,
            BoardCommand::Refresh => self.reload().await,
            BoardCommand::RemoteChange => {
                debug!(board = %self.store.board_id(), "remote change; refetching");
                self.reload().await
            }
        };

        match result {
            Err(err) if err.is_illegal_state() => {
                self.recover(&err).await;
                Err(err)
            }
            other => other,
        }
    }

    async fn move_issue(
        &self,
        issue_id: &EntityId,
        from: &EntityId,
        to: &EntityId,
    ) -> Result<CommandOutcome, CoreError> {
        let undo = self.store.snapshot();
        let next = self.store.apply_move(issue_id, from, to)?;
        if from == to {
            return Ok(CommandOutcome::Unchanged);
        }

        let status = next
            .column(to)
            .map(|c| c.status_key)
            .ok_or_else(|| CoreError::illegal(format!("column {to} vanished during move")))?;

        match self.backend.update_issue_status(issue_id, status).await {
            Ok(()) => {
                debug!(issue = %issue_id, %from, %to, "move confirmed");
                self.broadcast(&SyncMessage::IssueMoved {
                    issue_id: issue_id.clone(),
                    column_id: to.clone(),
                    status: status.as_str().to_owned(),
                });
                Ok(CommandOutcome::Moved)
            }
            Err(err) => {
                warn!(issue = %issue_id, error = %err, "move rejected; rolling back");
                if let Some(undo) = undo {
                    self.store.restore(undo);
                }
                let label = issue_label(&next, issue_id);
                self.notices
                    .publish(Notice::error(format!("Could not move {label}: {err}")));
                self.reload_after_failure().await;
                Err(err)
            }
        }
    }

    async fn create_issue(&self, title: &str) -> Result<CommandOutcome, CoreError> {
        let project_id = self.loaded()?.project_id.clone();

        let resp = match self.backend.create_issue(&project_id, title).await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(error = %err, "issue creation failed");
                self.notices
                    .publish(Notice::error(format!("Could not create \"{title}\": {err}")));
                return Err(err);
            }
        };

        let (column_id, issue) = place_created_issue(&*self.loaded()?, resp)?;
        let board = self.store.append_issue(&column_id, issue)?;
        let issue = board
            .column(&column_id)
            .and_then(|c| c.issues.last())
            .cloned()
            .ok_or_else(|| CoreError::illegal("created issue missing after append"))?;

        info!(issue = %issue.key, column = %column_id, "issue created");
        Ok(CommandOutcome::Created { issue })
    }

    async fn delete_issue(&self, issue_id: &EntityId) -> Result<CommandOutcome, CoreError> {
        let board = self.loaded()?;
        if board.find_issue(issue_id).is_none() {
            return Err(CoreError::illegal(format!("issue {issue_id} is not on the board")));
        }
        let label = issue_label(&board, issue_id);

        if let Err(err) = self.backend.delete_issue(issue_id).await {
            warn!(issue = %issue_id, error = %err, "issue deletion failed");
            self.notices
                .publish(Notice::error(format!("Could not delete {label}: {err}")));
            self.reload_after_failure().await;
            return Err(err);
        }

        self.store.remove_issue(issue_id)?;
        info!(issue = %label, "issue deleted");
        Ok(CommandOutcome::Deleted)
    }

    async fn reload(&self) -> Result<CommandOutcome, CoreError> {
        self.store.load(self.backend.as_ref()).await?;
        Ok(CommandOutcome::Reloaded)
    }

    async fn reload_after_failure(&self) {
        if let Err(err) = self.store.load(self.backend.as_ref()).await {
            warn!(error = %err, "reload after failed mutation also failed");
        }
    }

    async fn recover(&self, err: &CoreError) {
        error!(board = %self.store.board_id(), error = %err, "board state diverged; reloading");
        self.notices
            .publish(Notice::error(format!("Board out of sync, reloading: {err}")));
        self.reload_after_failure().await;
    }

    fn broadcast(&self, msg: &SyncMessage) {
        let Some(broadcaster) = &self.broadcaster else {
            return;
        };
        if let Err(err) = broadcaster.broadcast(msg) {
            debug!(error = %err, "move broadcast skipped");
        }
    }

    fn loaded(&self) -> Result<Arc<Board>, CoreError> {
        self.store.snapshot().ok_or_else(|| {
            CoreError::illegal(format!("board {} is not loaded", self.store.board_id()))
        })
    }

    /// Drain the command queue until cancelled or every sender is gone.
    ///
    /// Cancellation is only observed between commands, so the command in
    /// progress always finishes.
    pub(crate) async fn run(
        self,
        mut rx: mpsc::Receiver<CommandEnvelope>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                envelope = rx.recv() => {
                    let Some(envelope) = envelope else { break };
                    let result = self.handle(envelope.command).await;
                    let _ = envelope.response_tx.send(result);
                }
            }
        }
        debug!(board = %self.store.board_id(), "reconciler stopped");
    }
}

fn issue_label(board: &Board, issue_id: &EntityId) -> String {
    board
        .find_issue(issue_id)
        .map_or_else(|| issue_id.to_string(), |(_, issue)| issue.key.clone())
}
