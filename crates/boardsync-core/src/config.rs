// ── Runtime session configuration ──
//
// Describes how to reach one board. Carries the credential and
// connection tuning but never touches disk; the CLI builds a
// `SessionConfig` from its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use boardsync_api::transport::{TlsMode, TransportConfig};
use boardsync_api::ReconnectConfig;

use crate::model::EntityId;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development servers).
    DangerAcceptInvalid,
}

/// Configuration for one board session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// REST base URL, e.g. `https://tracker.example.com`.
    pub api_url: Url,
    pub board_id: EntityId,
    /// Sent as `Authorization: Bearer ...` on REST and socket requests.
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    pub timeout: Duration,
    /// Connect the realtime socket on `open()`.
    pub sync_enabled: bool,
    /// Socket URL override; derived from `api_url` when unset.
    pub sync_url: Option<Url>,
    pub reconnect: ReconnectConfig,
}

impl SessionConfig {
    pub fn new(api_url: Url, board_id: impl Into<EntityId>) -> Self {
        Self {
            api_url,
            board_id: board_id.into(),
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            sync_enabled: true,
            sync_url: None,
            reconnect: ReconnectConfig::default(),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
            token: self.token.clone(),
        }
    }
}
