// ── Board snapshot store ──
//
// Holds the current board in a `watch` channel so renderers are pushed
// every new snapshot. Writes come from one owner at a time: the initial
// load, then the reconciler task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use super::transition;
use crate::backend::BoardBackend;
use crate::error::CoreError;
use crate::model::{Board, EntityId, Issue};
use crate::stream::BoardStream;

/// Canonical in-memory snapshot of one board.
pub struct BoardStore {
    board_id: EntityId,
    snapshot: watch::Sender<Option<Arc<Board>>>,
    last_loaded: watch::Sender<Option<DateTime<Utc>>>,
}

impl BoardStore {
    pub fn new(board_id: EntityId) -> Self {
        let (snapshot, _) = watch::channel(None);
        let (last_loaded, _) = watch::channel(None);
        Self {
            board_id,
            snapshot,
            last_loaded,
        }
    }

    pub fn board_id(&self) -> &EntityId {
        &self.board_id
    }

    /// Fetch the full board and replace the snapshot wholesale.
    ///
    /// Nothing is installed if the fetch or validation fails.
    pub async fn load(&self, backend: &dyn BoardBackend) -> Result<Arc<Board>, CoreError> {
        let board = Arc::new(backend.get_board(&self.board_id).await?);
        board.check_invariants()?;

        self.snapshot.send_replace(Some(Arc::clone(&board)));
        self.last_loaded.send_replace(Some(Utc::now()));
        debug!(
            board = %self.board_id,
            columns = board.columns.len(),
            issues = board.total_issues(),
            "board loaded"
        );
        Ok(board)
    }

    /// Current state for rendering.
    pub fn snapshot(&self) -> Option<Arc<Board>> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> BoardStream {
        BoardStream::new(self.snapshot.subscribe())
    }

    /// When the last successful [`load`](Self::load) finished.
    pub fn last_loaded(&self) -> Option<DateTime<Utc>> {
        *self.last_loaded.borrow()
    }

    fn current(&self) -> Result<Arc<Board>, CoreError> {
        self.snapshot()
            .ok_or_else(|| CoreError::illegal(format!("board {} is not loaded", self.board_id)))
    }

    fn publish(&self, board: Board) -> Arc<Board> {
        let board = Arc::new(board);
        self.snapshot.send_replace(Some(Arc::clone(&board)));
        board
    }

    /// Apply a move and publish the result. A same-column move publishes
    /// nothing and returns the current snapshot.
    pub fn apply_move(
        &self,
        issue_id: &EntityId,
        from: &EntityId,
        to: &EntityId,
    ) -> Result<Arc<Board>, CoreError> {
        let current = self.current()?;
        let next = transition::apply_move(&current, issue_id, from, to)?;
        if from == to {
            return Ok(current);
        }
        Ok(self.publish(next))
    }

    /// Reinstall an earlier snapshot, e.g. an undo point.
    pub fn restore(&self, snapshot: Arc<Board>) {
        self.snapshot.send_replace(Some(snapshot));
    }

    pub fn append_issue(&self, column_id: &EntityId, issue: Issue) -> Result<Arc<Board>, CoreError> {
        let current = self.current()?;
        let next = transition::append_issue(&current, column_id, issue)?;
        Ok(self.publish(next))
    }

    pub fn remove_issue(&self, issue_id: &EntityId) -> Result<Arc<Board>, CoreError> {
        let current = self.current()?;
        let next = transition::remove_issue(&current, issue_id)?;
        Ok(self.publish(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeBackend, board};

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    #[tokio::test]
    async fn load_installs_snapshot() {
        let backend = FakeBackend::new(board(&[("todo", &["A"]), ("done", &[])]));
        let store = BoardStore::new(id("b1"));
        assert!(store.snapshot().is_none());
        assert!(store.last_loaded().is_none());

        store.load(&backend).await.unwrap();

        assert_eq!(store.snapshot().unwrap().total_issues(), 1);
        assert!(store.last_loaded().is_some());
        assert_eq!(backend.load_count(), 1);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_snapshot() {
        let backend = FakeBackend::new(board(&[("todo", &["A"])]));
        let store = BoardStore::new(id("b1"));
        store.load(&backend).await.unwrap();

        let mut other = board(&[("todo", &[])]);
        other.id = id("other");
        backend.set_remote(other);

        let err = store.load(&backend).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.snapshot().unwrap().total_issues(), 1);
    }

    #[test]
    fn mutations_before_load_are_illegal() {
        let store = BoardStore::new(id("b1"));
        let err = store.apply_move(&id("A"), &id("todo"), &id("done")).unwrap_err();
        assert!(err.is_illegal_state());
    }

    #[tokio::test]
    async fn move_is_published_and_restorable() {
        let backend = FakeBackend::new(board(&[("todo", &["A"]), ("done", &[])]));
        let store = BoardStore::new(id("b1"));
        let before = store.load(&backend).await.unwrap();
        let mut stream = store.subscribe();

        store.apply_move(&id("A"), &id("todo"), &id("done")).unwrap();
        let seen = stream.changed().await.unwrap().unwrap();
        assert_eq!(seen.columns[1].issue_count, 1);

        store.restore(Arc::clone(&before));
        assert_eq!(*store.snapshot().unwrap(), *before);
    }

    #[tokio::test]
    async fn same_column_move_publishes_nothing() {
        let backend = FakeBackend::new(board(&[("todo", &["A"])]));
        let store = BoardStore::new(id("b1"));
        let before = store.load(&backend).await.unwrap();
        let rx = store.snapshot.subscribe();

        let after = store.apply_move(&id("A"), &id("todo"), &id("todo")).unwrap();

        assert!(Arc::ptr_eq(&before, &after));
        assert!(!rx.has_changed().unwrap());
    }
}
