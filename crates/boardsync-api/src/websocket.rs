//! Board socket with auto-reconnect.
//!
//! One connection per open board at `ws(s)://<host>/ws/boards/{id}/`.
//! Inbound change notifications are parsed and fanned out through a
//! [`tokio::sync::broadcast`] channel; outbound move notifications are
//! queued through [`SyncSender`]. Reconnection uses exponential backoff
//! with jitter and keeps trying until the handle is shut down.
//!
//! # Example
//!
//! ```rust,ignore
//! use boardsync_api::websocket::{board_socket_url, ReconnectConfig, SyncHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let url = board_socket_url(&base_url, &board_id)?;
//! let handle = SyncHandle::connect(url, ReconnectConfig::default(), CancellationToken::new(), None);
//! let mut rx = handle.subscribe();
//!
//! while let Ok(msg) = rx.recv().await {
//!     println!("{msg:?}");
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::ids::EntityId;

// ── Channel capacities ───────────────────────────────────────────────

const INBOUND_CHANNEL_CAPACITY: usize = 256;
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

// ── SyncMessage ──────────────────────────────────────────────────────

/// A board change notification, in both directions.
///
/// Wire shape: `{ "type": "issue_moved", "issue_id", "column_id", "status" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncMessage {
    IssueMoved {
        issue_id: EntityId,
        column_id: EntityId,
        status: String,
    },
}

// ── SyncState ────────────────────────────────────────────────────────

/// Socket lifecycle, observable through [`SyncHandle::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Connecting,
    Open,
    Reconnecting { attempt: u32 },
    Closed,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for socket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry until shut down.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── URL derivation ───────────────────────────────────────────────────

/// Derive the board socket URL from the REST base URL.
///
/// `https://host/prefix` becomes `wss://host/prefix/ws/boards/{id}/`.
pub fn board_socket_url(base_url: &Url, board_id: &EntityId) -> Result<Url, Error> {
    let scheme = match base_url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::WebSocketConnect(format!(
                "unsupported URL scheme '{other}'"
            )));
        }
    };

    let mut url = base_url.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::WebSocketConnect(format!("cannot use scheme '{scheme}'")))?;
    let prefix = base_url.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}/ws/boards/{board_id}/"));
    url.set_query(None);
    Ok(url)
}

// ── SyncHandle ───────────────────────────────────────────────────────

/// Handle to a running board socket.
///
/// Call [`shutdown`](Self::shutdown) to tear down the background task.
pub struct SyncHandle {
    inbound_rx: broadcast::Receiver<Arc<SyncMessage>>,
    sender: SyncSender,
    cancel: CancellationToken,
}

impl SyncHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// The first connection attempt happens in the background. Must be
    /// called from within a tokio runtime.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        token: Option<SecretString>,
    ) -> Self {
        let (inbound_tx, inbound_rx) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SyncState::Connecting);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let link = Link {
                url: ws_url,
                token,
                inbound_tx,
                state_tx,
            };
            ws_loop(link, outbound_rx, reconnect, task_cancel).await;
        });

        Self {
            inbound_rx,
            sender: SyncSender {
                outbound_tx,
                state_rx,
            },
            cancel,
        }
    }

    /// Get a new receiver for inbound board notifications.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SyncMessage>> {
        self.inbound_rx.resubscribe()
    }

    /// A cloneable sender for outbound notifications.
    pub fn sender(&self) -> SyncSender {
        self.sender.clone()
    }

    /// Observe the socket lifecycle.
    pub fn state(&self) -> watch::Receiver<SyncState> {
        self.sender.state_rx.clone()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── SyncSender ───────────────────────────────────────────────────────

/// Outbound side of a [`SyncHandle`].
#[derive(Debug, Clone)]
pub struct SyncSender {
    outbound_tx: mpsc::Sender<String>,
    state_rx: watch::Receiver<SyncState>,
}

impl SyncSender {
    /// Best-effort broadcast to the other clients on this board.
    ///
    /// Fails immediately when the socket is not open or the queue is
    /// full; nothing is buffered for a later connection.
    pub fn broadcast(&self, msg: &SyncMessage) -> Result<(), Error> {
        let state = *self.state_rx.borrow();
        if state != SyncState::Open {
            return Err(Error::SocketUnavailable(format!("socket is {state:?}")));
        }

        let text = serde_json::to_string(msg)?;
        self.outbound_tx
            .try_send(text)
            .map_err(|e| Error::SocketUnavailable(e.to_string()))
    }
}

// ── Background reconnection loop ─────────────────────────────────────

struct Link {
    url: Url,
    token: Option<SecretString>,
    inbound_tx: broadcast::Sender<Arc<SyncMessage>>,
    state_tx: watch::Sender<SyncState>,
}

/// Main loop: connect → pump → on drop, backoff → reconnect.
///
/// The state leaves `Open` as soon as a connection drops, so nothing is
/// accepted for sending during the backoff sleep.
async fn ws_loop(
    link: Link,
    mut outbound_rx: mpsc::Receiver<String>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    // Consecutive attempts that never reached Open.
    let mut attempt: u32 = 0;
    let _ = link.state_tx.send(SyncState::Connecting);

    loop {
        let mut opened = false;
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_pump(&link, &mut outbound_rx, &cancel, &mut opened) => result,
        };

        if cancel.is_cancelled() {
            break;
        }

        // A session that reached Open restarts the count.
        if opened {
            attempt = 0;
        }

        match result {
            Ok(()) => {
                tracing::info!("board socket disconnected cleanly, reconnecting");
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, opened, "board socket error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "board socket reconnection limit reached, giving up"
                        );
                        break;
                    }
                }
            }
        }

        let delay = calculate_backoff(attempt, &reconnect);
        attempt = attempt.saturating_add(1);
        let _ = link.state_tx.send(SyncState::Reconnecting { attempt });
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    let _ = link.state_tx.send(SyncState::Closed);
    tracing::debug!("board socket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection and pump frames both ways until it drops.
async fn connect_and_pump(
    link: &Link,
    outbound_rx: &mut mpsc::Receiver<String>,
    cancel: &CancellationToken,
    opened: &mut bool,
) -> Result<(), Error> {
    tracing::info!(url = %link.url, "connecting board socket");

    let uri: tungstenite::http::Uri = link
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(token) = link.token.as_ref() {
        request = request.with_header("Authorization", format!("Bearer {}", token.expose_secret()));
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    // Frames queued for a connection that has since dropped are stale.
    let mut stale = 0_usize;
    while outbound_rx.try_recv().is_ok() {
        stale += 1;
    }
    if stale > 0 {
        tracing::debug!(stale, "discarded outbound frames from previous connection");
    }

    tracing::info!("board socket open");
    *opened = true;
    let _ = link.state_tx.send(SyncState::Open);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(());
            }
            Some(text) = outbound_rx.recv() => {
                write
                    .send(tungstenite::Message::text(text))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_broadcast(&text, &link.inbound_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pings on the next write/flush
                        tracing::trace!("board socket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "board socket close frame received"
                            );
                        } else {
                            tracing::info!("board socket close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("board socket stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse one inbound text frame. Malformed or unknown messages yield `None`.
pub fn parse_message(text: &str) -> Option<SyncMessage> {
    match serde_json::from_str::<SyncMessage>(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::debug!(error = %e, "dropping unrecognised board socket message");
            None
        }
    }
}

fn parse_and_broadcast(text: &str, inbound_tx: &broadcast::Sender<Arc<SyncMessage>>) {
    if let Some(msg) = parse_message(text) {
        // Ignore send errors -- just means no active subscribers right now
        let _ = inbound_tx.send(Arc::new(msg));
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
///
/// Jitter spreads out reconnection storms when a server restarts under
/// many open boards.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(32)).unwrap_or(32);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        for attempt in [10, 40, u32::MAX] {
            let delay = calculate_backoff(attempt, &config);
            // With jitter factor up to 1.25, max effective is 12.5s
            assert!(
                delay <= Duration::from_millis(12_500),
                "delay at attempt {attempt} ({delay:?}) should be capped near max_delay"
            );
        }
    }

    #[test]
    fn parse_issue_moved() {
        let msg = parse_message(
            r#"{"type":"issue_moved","issue_id":12,"column_id":"4","status":"in_review"}"#,
        );
        assert_eq!(
            msg,
            Some(SyncMessage::IssueMoved {
                issue_id: EntityId::from(12),
                column_id: EntityId::from(4),
                status: "in_review".into(),
            })
        );
    }

    #[test]
    fn unknown_and_malformed_messages_are_dropped() {
        assert!(parse_message("not json at all").is_none());
        assert!(parse_message(r#"{"type":"issue_created","issue_id":1}"#).is_none());
        assert!(parse_message(r#"{"type":"issue_moved","issue_id":1}"#).is_none());
    }

    #[test]
    fn parse_and_broadcast_skips_garbage() {
        let (tx, mut rx) = broadcast::channel::<Arc<SyncMessage>>(16);

        parse_and_broadcast("{]", &tx);
        assert!(rx.try_recv().is_err());

        parse_and_broadcast(
            r#"{"type":"issue_moved","issue_id":1,"column_id":2,"status":"done"}"#,
            &tx,
        );
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn outbound_message_shape() {
        let msg = SyncMessage::IssueMoved {
            issue_id: EntityId::from(7),
            column_id: EntityId::from(3),
            status: "done".into(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "type": "issue_moved", "issue_id": 7, "column_id": 3, "status": "done" })
        );
    }

    #[test]
    fn socket_url_from_https_base() {
        let base = Url::parse("https://boards.example.com/").unwrap();
        let url = board_socket_url(&base, &EntityId::from(9)).unwrap();
        assert_eq!(url.as_str(), "wss://boards.example.com/ws/boards/9/");
    }

    #[test]
    fn socket_url_keeps_port_and_prefix() {
        let base = Url::parse("http://localhost:8000/app?x=1").unwrap();
        let url = board_socket_url(&base, &EntityId::from("b1")).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/app/ws/boards/b1/");
    }

    #[test]
    fn socket_url_rejects_other_schemes() {
        let base = Url::parse("ftp://example.com/").unwrap();
        assert!(board_socket_url(&base, &EntityId::from(1)).is_err());
    }

    #[tokio::test]
    async fn broadcast_refused_until_open() {
        let (outbound_tx, mut outbound_rx) = mpsc::channel(4);
        let (state_tx, state_rx) = watch::channel(SyncState::Connecting);
        let sender = SyncSender {
            outbound_tx,
            state_rx,
        };
        let msg = SyncMessage::IssueMoved {
            issue_id: EntityId::from(1),
            column_id: EntityId::from(2),
            status: "done".into(),
        };

        assert!(matches!(
            sender.broadcast(&msg),
            Err(Error::SocketUnavailable(_))
        ));

        state_tx.send(SyncState::Open).unwrap();
        sender.broadcast(&msg).unwrap();
        let text = outbound_rx.recv().await.unwrap();
        assert_eq!(parse_message(&text), Some(msg));
    }
}
