// ── Domain model ──
//
// Board, column and issue types consumed by the store, the reconciler
// and every renderer. Identifiers are shared with the api crate.

mod board;

pub use boardsync_api::EntityId;
pub use board::{Board, Column, Issue, StatusKey};
