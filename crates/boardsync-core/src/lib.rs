// boardsync-core: board state, optimistic reconciliation and realtime
// sync between boardsync-api and consumers (CLI).

pub mod backend;
pub mod command;
pub mod config;
pub mod convert;
pub mod drag;
pub mod error;
pub mod model;
pub mod notice;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod stream;

#[cfg(test)]
mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::{BoardBackend, Broadcaster};
pub use command::{BoardCommand, CommandOutcome};
pub use config::{SessionConfig, TlsVerification};
pub use drag::{DragDropController, DragEvent, DragState, MoveIntent};
pub use error::CoreError;
pub use notice::{Notice, NoticeLevel, Notices};
pub use reconciler::Reconciler;
pub use session::BoardSession;
pub use store::BoardStore;
pub use stream::BoardStream;

pub use boardsync_api::{ReconnectConfig, SyncState};
pub use model::{Board, Column, EntityId, Issue, StatusKey};
