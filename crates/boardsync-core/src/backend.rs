// ── Remote seams ──
//
// The store and reconciler talk to the server through these traits so
// tests can substitute in-memory fakes. `ApiClient` and `SyncSender`
// are the production implementations.

use async_trait::async_trait;
use tracing::debug;

use boardsync_api::{ApiClient, IssueResponse, SyncMessage, SyncSender};

use crate::convert::board_from_response;
use crate::error::CoreError;
use crate::model::{Board, EntityId, StatusKey};

/// REST operations the board core depends on.
#[async_trait]
pub trait BoardBackend: Send + Sync {
    /// Fetch and normalize the full board.
    async fn get_board(&self, board_id: &EntityId) -> Result<Board, CoreError>;

    /// Persist an issue's new status. No retries.
    async fn update_issue_status(
        &self,
        issue_id: &EntityId,
        status: StatusKey,
    ) -> Result<(), CoreError>;

    async fn create_issue(
        &self,
        project_id: &EntityId,
        title: &str,
    ) -> Result<IssueResponse, CoreError>;

    async fn delete_issue(&self, issue_id: &EntityId) -> Result<(), CoreError>;
}

/// Outbound channel for confirmed moves.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, msg: &SyncMessage) -> Result<(), CoreError>;
}

/// Re-label a transport 404 with the entity the caller asked for.
fn label_not_found(entity_type: &str, id: &EntityId) -> impl FnOnce(boardsync_api::Error) -> CoreError {
    let entity_type = entity_type.to_owned();
    let identifier = id.to_string();
    move |err| match CoreError::from(err) {
        CoreError::NotFound { .. } => CoreError::NotFound {
            entity_type,
            identifier,
        },
        other => other,
    }
}

#[async_trait]
impl BoardBackend for ApiClient {
    async fn get_board(&self, board_id: &EntityId) -> Result<Board, CoreError> {
        let resp = ApiClient::get_board(self, board_id)
            .await
            .map_err(label_not_found("board", board_id))?;
        debug!(board = %board_id, columns = resp.columns.len(), "board fetched");
        board_from_response(resp)
    }

    async fn update_issue_status(
        &self,
        issue_id: &EntityId,
        status: StatusKey,
    ) -> Result<(), CoreError> {
        ApiClient::update_issue_status(self, issue_id, status.as_str())
            .await
            .map_err(label_not_found("issue", issue_id))
    }

    async fn create_issue(
        &self,
        project_id: &EntityId,
        title: &str,
    ) -> Result<IssueResponse, CoreError> {
        ApiClient::create_issue(self, project_id, title)
            .await
            .map_err(label_not_found("project", project_id))
    }

    async fn delete_issue(&self, issue_id: &EntityId) -> Result<(), CoreError> {
        ApiClient::delete_issue(self, issue_id)
            .await
            .map_err(label_not_found("issue", issue_id))
    }
}

impl Broadcaster for SyncSender {
    fn broadcast(&self, msg: &SyncMessage) -> Result<(), CoreError> {
        SyncSender::broadcast(self, msg).map_err(CoreError::from)
    }
}
