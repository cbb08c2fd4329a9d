#![allow(clippy::unwrap_used)]
// End-to-end session tests: wiremock for REST, a local tungstenite
// server for the board socket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use boardsync_core::{
    BoardCommand, BoardSession, CommandOutcome, EntityId, ReconnectConfig, SessionConfig,
    SyncState,
};

const WAIT: Duration = Duration::from_secs(5);

fn board_body() -> serde_json::Value {
    json!({
        "id": 1,
        "name": "Platform",
        "project_id": 7,
        "columns": [
            {
                "id": 10,
                "name": "To do",
                "status_key": "todo",
                "issue_count": 1,
                "issues": [{ "id": 100, "key": "PLT-1", "title": "Set up CI" }]
            },
            { "id": 11, "name": "Done", "status_key": "done", "issues": [] }
        ]
    })
}

fn config(api: &MockServer) -> SessionConfig {
    let mut config = SessionConfig::new(Url::parse(&api.uri()).unwrap(), 1_u64);
    config.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_retries: None,
    };
    config
}

async fn mount_board(api: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/agile/boards/1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(board_body()))
        .mount(api)
        .await;
}

async fn board_fetches(api: &MockServer) -> usize {
    api.received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count()
}

#[tokio::test]
async fn move_is_broadcast_and_remote_change_refetches() {
    let api = MockServer::start().await;
    mount_board(&api).await;
    Mock::given(method("PUT"))
        .and(path("/api/agile/issues/100/"))
        .and(body_json(json!({ "status": "done" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&api)
        .await;

    // Socket peer: report the first broadcast, then announce a change.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel::<String>();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(frame)) = ws.next().await {
            if let Message::Text(text) = frame {
                let _ = seen_tx.send(text.to_string());
                break;
            }
        }
        ws.send(Message::text(
            r#"{"type":"issue_moved","issue_id":100,"column_id":10,"status":"todo"}"#,
        ))
        .await
        .unwrap();
        while ws.next().await.is_some() {}
    });

    let mut cfg = config(&api);
    cfg.sync_url = Some(Url::parse(&format!("ws://{addr}/ws/boards/1/")).unwrap());
    let session = BoardSession::new(cfg).unwrap();
    session.open().await.unwrap();

    let mut state = session.sync_state();
    timeout(WAIT, state.wait_for(|s| *s == SyncState::Open))
        .await
        .unwrap()
        .unwrap();

    let mut board = session.subscribe_board();
    let outcome = session
        .execute(BoardCommand::MoveIssue {
            issue_id: EntityId::from(100),
            from: EntityId::from(10),
            to: EntityId::from(11),
        })
        .await
        .unwrap();
    assert_eq!(outcome, CommandOutcome::Moved);

    let broadcast: serde_json::Value =
        serde_json::from_str(&timeout(WAIT, seen_rx).await.unwrap().unwrap()).unwrap();
    assert_eq!(
        broadcast,
        json!({ "type": "issue_moved", "issue_id": 100, "column_id": 11, "status": "done" })
    );

    // The server still reports the issue in `todo`; the refetch wins.
    timeout(WAIT, async {
        loop {
            let snap = board.changed().await.unwrap().unwrap();
            if snap.columns[0].issue_count == 1 {
                break;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(board_fetches(&api).await, 2);

    session.close().await;
    assert_eq!(*session.sync_state().borrow(), SyncState::Closed);
}

#[tokio::test]
async fn rejected_move_rolls_back_and_reports() {
    let api = MockServer::start().await;
    mount_board(&api).await;
    Mock::given(method("PUT"))
        .and(path("/api/agile/issues/100/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&api)
        .await;

    let mut cfg = config(&api);
    cfg.sync_enabled = false;
    let session = BoardSession::new(cfg).unwrap();
    session.open().await.unwrap();
    let mut notices = session.notices();

    let err = session
        .execute(BoardCommand::MoveIssue {
            issue_id: EntityId::from(100),
            from: EntityId::from(10),
            to: EntityId::from(11),
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("500"), "unexpected error: {err}");
    let board = session.board().unwrap();
    assert_eq!(board.columns[0].issue_count, 1);
    assert_eq!(board.columns[1].issue_count, 0);
    assert!(notices.try_recv().unwrap().message.contains("PLT-1"));
    assert_eq!(board_fetches(&api).await, 2);

    session.close().await;
}

#[tokio::test]
async fn missing_board_fails_open() {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/agile/boards/1/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&api)
        .await;

    let mut cfg = config(&api);
    cfg.sync_enabled = false;
    let session = BoardSession::new(cfg).unwrap();

    let err = session.open().await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("board"));
    assert!(session.board().is_none());
}
