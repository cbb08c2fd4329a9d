// ── Core error types ──
//
// Domain-level errors from boardsync-core. Consumers never see HTTP
// status codes or JSON parse failures directly; the
// `From<boardsync_api::Error>` impl translates transport errors into
// this taxonomy.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Remote failures ──────────────────────────────────────────────
    /// The request never completed (connection refused, timeout, socket down).
    #[error("Network error: {reason}")]
    Network { reason: String },

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The server answered with a non-2xx status other than 401/403/404.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// A payload from the server could not be understood.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ── Local failures ───────────────────────────────────────────────
    /// A board invariant does not hold, e.g. an issue missing from the
    /// column a move names.
    #[error("Illegal board state: {message}")]
    IllegalState { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The session's command queue is gone.
    #[error("Board session is closed")]
    SessionClosed,
}

impl CoreError {
    pub(crate) fn illegal(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<boardsync_api::Error> for CoreError {
    fn from(err: boardsync_api::Error) -> Self {
        use boardsync_api::Error as ApiError;

        let not_found = err.is_not_found();
        match err {
            ApiError::Authentication { status } => CoreError::AuthenticationFailed {
                message: format!("server answered HTTP {status}"),
            },
            ApiError::Transport(ref e) if not_found => CoreError::NotFound {
                entity_type: "resource".into(),
                identifier: e.url().map(|u| u.path().to_owned()).unwrap_or_default(),
            },
            ApiError::Transport(_) => CoreError::Network {
                reason: err.to_string(),
            },
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            ApiError::NotFound { path } => CoreError::NotFound {
                entity_type: "resource".into(),
                identifier: path,
            },
            ApiError::Status { status, body } => CoreError::Api {
                status,
                message: body,
            },
            ApiError::WebSocketConnect(reason) | ApiError::SocketUnavailable(reason) => {
                CoreError::Network { reason }
            }
            ApiError::Deserialization { message, body: _ } => CoreError::Protocol { message },
            ApiError::Encode(e) => CoreError::Protocol {
                message: e.to_string(),
            },
        }
    }
}
