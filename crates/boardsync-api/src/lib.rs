// boardsync-api: Async Rust client for the agile board REST API and board socket

pub mod client;
pub mod error;
pub mod ids;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::ApiClient;
pub use error::Error;
pub use ids::EntityId;
pub use models::{BoardResponse, ColumnResponse, IssueResponse};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ReconnectConfig, SyncHandle, SyncMessage, SyncSender, SyncState};
