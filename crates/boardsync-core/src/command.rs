// ── Command API ──
//
// Every board mutation flows through a `BoardCommand`. The session
// queues commands to a single reconciler task, which resolves them one
// at a time and answers on the envelope's oneshot channel.

use serde::Serialize;

use crate::drag::MoveIntent;
use crate::error::CoreError;
use crate::model::{EntityId, Issue};

/// A command envelope sent through the command channel.
pub(crate) struct CommandEnvelope {
    pub command: BoardCommand,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandOutcome, CoreError>>,
}

/// All operations the reconciler accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCommand {
    /// Optimistically move an issue, then confirm with the server.
    MoveIssue {
        issue_id: EntityId,
        from: EntityId,
        to: EntityId,
    },
    CreateIssue { title: String },
    DeleteIssue { issue_id: EntityId },
    /// Explicit full reload.
    Refresh,
    /// Another client changed the board; refetch.
    RemoteChange,
}

impl From<MoveIntent> for BoardCommand {
    fn from(intent: MoveIntent) -> Self {
        Self::MoveIssue {
            issue_id: intent.issue_id,
            from: intent.from,
            to: intent.to,
        }
    }
}

/// How a command resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// The move was confirmed and is final.
    Moved,
    /// Nothing to do, e.g. a drop onto the issue's own column.
    Unchanged,
    Created { issue: Issue },
    Deleted,
    Reloaded,
}
