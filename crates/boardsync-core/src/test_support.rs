// Fixtures and fakes shared by the unit tests in this crate.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use boardsync_api::{IssueResponse, SyncMessage};

use crate::backend::{BoardBackend, Broadcaster};
use crate::error::CoreError;
use crate::model::{Board, Column, EntityId, Issue, StatusKey};

/// An issue whose id is `id` and key is `KEY-<id>`.
pub(crate) fn issue(id: &str) -> Issue {
    Issue {
        id: EntityId::from(id),
        key: format!("KEY-{id}"),
        title: format!("Issue {id}"),
        assignee: None,
        story_points: None,
        status: StatusKey::Todo,
        column_id: EntityId::from("todo"),
    }
}

/// Build a board from `(status, issue ids)` pairs. Column ids equal the
/// status string.
pub(crate) fn board(columns: &[(&str, &[&str])]) -> Board {
    let columns = columns
        .iter()
        .map(|(status, ids)| {
            let key: StatusKey = status.parse().unwrap();
            let mut column = Column::new(*status, status.replace('_', " "), key);
            for id in *ids {
                column.push(issue(id));
            }
            column
        })
        .collect();

    Board {
        id: EntityId::from("b1"),
        name: "Test board".into(),
        project_id: EntityId::from("p1"),
        columns,
    }
}

/// Issue ids per column, for compact assertions.
pub(crate) fn layout(board: &Board) -> Vec<(String, Vec<String>)> {
    board
        .columns
        .iter()
        .map(|c| {
            (
                c.id.to_string(),
                c.issues.iter().map(|i| i.id.to_string()).collect(),
            )
        })
        .collect()
}

// ── Fake backend ────────────────────────────────────────────────────

/// Lets a test hold an update request open until it says so.
pub(crate) struct Gate {
    /// Receives the issue id each time an update starts.
    pub started: mpsc::UnboundedReceiver<EntityId>,
    release: mpsc::UnboundedSender<()>,
}

impl Gate {
    pub(crate) fn release(&self) {
        self.release.send(()).unwrap();
    }
}

struct GateInner {
    started: mpsc::UnboundedSender<EntityId>,
    release: Mutex<mpsc::UnboundedReceiver<()>>,
}

/// In-memory server that counts loads and records mutations.
pub(crate) struct FakeBackend {
    remote: StdMutex<Board>,
    loads: AtomicUsize,
    updates: StdMutex<Vec<(EntityId, StatusKey)>>,
    deletes: StdMutex<Vec<EntityId>>,
    created: AtomicUsize,
    fail_updates: AtomicBool,
    fail_deletes: AtomicBool,
    fail_loads: AtomicBool,
    gate: Option<GateInner>,
}

impl FakeBackend {
    pub(crate) fn new(remote: Board) -> Self {
        Self {
            remote: StdMutex::new(remote),
            loads: AtomicUsize::new(0),
            updates: StdMutex::new(Vec::new()),
            deletes: StdMutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            fail_updates: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
            gate: None,
        }
    }

    /// A backend whose updates block until the returned gate releases them.
    pub(crate) fn gated(remote: Board) -> (Self, Gate) {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = mpsc::unbounded_channel();
        let mut backend = Self::new(remote);
        backend.gate = Some(GateInner {
            started: started_tx,
            release: Mutex::new(release_rx),
        });
        (
            backend,
            Gate {
                started: started_rx,
                release: release_tx,
            },
        )
    }

    pub(crate) fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Replace what the next `get_board` returns.
    pub(crate) fn set_remote(&self, board: Board) {
        *self.remote.lock().unwrap() = board;
    }

    pub(crate) fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub(crate) fn updates(&self) -> Vec<(EntityId, StatusKey)> {
        self.updates.lock().unwrap().clone()
    }

    pub(crate) fn deletes(&self) -> Vec<EntityId> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BoardBackend for FakeBackend {
    async fn get_board(&self, board_id: &EntityId) -> Result<Board, CoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(CoreError::Network {
                reason: "connection refused".into(),
            });
        }
        let board = self.remote.lock().unwrap().clone();
        if &board.id == board_id {
            Ok(board)
        } else {
            Err(CoreError::NotFound {
                entity_type: "board".into(),
                identifier: board_id.to_string(),
            })
        }
    }

    async fn update_issue_status(
        &self,
        issue_id: &EntityId,
        status: StatusKey,
    ) -> Result<(), CoreError> {
        self.updates
            .lock()
            .unwrap()
            .push((issue_id.clone(), status));

        if let Some(gate) = &self.gate {
            gate.started.send(issue_id.clone()).unwrap();
            gate.release.lock().await.recv().await;
        }

        if self.fail_updates.load(Ordering::SeqCst) {
            Err(CoreError::Api {
                status: 500,
                message: "boom".into(),
            })
        } else {
            Ok(())
        }
    }

    async fn create_issue(
        &self,
        _project_id: &EntityId,
        title: &str,
    ) -> Result<IssueResponse, CoreError> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IssueResponse {
            id: EntityId::from(format!("N{n}")),
            key: format!("NEW-{n}"),
            title: title.to_owned(),
            assignee: None,
            story_points: None,
            status: Some("todo".into()),
            column_id: None,
        })
    }

    async fn delete_issue(&self, issue_id: &EntityId) -> Result<(), CoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CoreError::Network {
                reason: "connection reset".into(),
            });
        }
        self.deletes.lock().unwrap().push(issue_id.clone());
        Ok(())
    }
}

// ── Recording broadcaster ───────────────────────────────────────────

#[derive(Default)]
pub(crate) struct RecordingBroadcaster {
    sent: StdMutex<Vec<SyncMessage>>,
    offline: AtomicBool,
}

impl RecordingBroadcaster {
    pub(crate) fn offline() -> Self {
        Self {
            sent: StdMutex::default(),
            offline: AtomicBool::new(true),
        }
    }

    pub(crate) fn sent(&self) -> Vec<SyncMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, msg: &SyncMessage) -> Result<(), CoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::Network {
                reason: "socket is not open".into(),
            });
        }
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }
}
