// ── Board state store ──
//
// Single authoritative snapshot of one board plus the pure transitions
// that produce the next snapshot.

mod board_store;
pub mod transition;

pub use board_store::BoardStore;
