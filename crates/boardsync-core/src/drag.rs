// ── Drag-and-drop state machine ──
//
// Translates pointer events from a board view into move intents. The
// controller never touches the store; a drop onto a different column
// yields a `MoveIntent` for the caller to submit.

use serde::Serialize;
use tracing::trace;

use crate::model::EntityId;

/// A request to move an issue between columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveIntent {
    pub issue_id: EntityId,
    pub from: EntityId,
    pub to: EntityId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        issue_id: EntityId,
        source: EntityId,
        /// Column currently under the pointer, if any.
        hover: Option<EntityId>,
    },
}

/// Input events from the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    Start { issue_id: EntityId, source: EntityId },
    /// `None` when the pointer leaves every column.
    Hover(Option<EntityId>),
    Drop,
    /// Escape, or a drop outside the board.
    Cancel,
}

/// One controller per board view.
#[derive(Debug, Default)]
pub struct DragDropController {
    state: DragState,
}

impl DragDropController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Feed one event; returns an intent only for an effective drop.
    pub fn handle(&mut self, event: DragEvent) -> Option<MoveIntent> {
        match event {
            DragEvent::Start { issue_id, source } => {
                self.start(issue_id, source);
                None
            }
            DragEvent::Hover(column) => {
                self.hover(column);
                None
            }
            DragEvent::Drop => self.drop(),
            DragEvent::Cancel => {
                self.cancel();
                None
            }
        }
    }

    /// Begin dragging. A drag already in progress is discarded.
    pub fn start(&mut self, issue_id: EntityId, source: EntityId) {
        if let DragState::Dragging { issue_id: stale, .. } = &self.state {
            trace!(%stale, "replacing unfinished drag");
        }
        self.state = DragState::Dragging {
            issue_id,
            source,
            hover: None,
        };
    }

    pub fn hover(&mut self, column: Option<EntityId>) {
        if let DragState::Dragging { hover, .. } = &mut self.state {
            *hover = column;
        }
    }

    /// Finish the drag. Always ends in `Idle`.
    pub fn drop(&mut self) -> Option<MoveIntent> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging {
                issue_id,
                source,
                hover: Some(target),
            } if target != source => Some(MoveIntent {
                issue_id,
                from: source,
                to: target,
            }),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}
