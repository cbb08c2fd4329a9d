//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use boardsync_core::{Board, BoardSession, Column, EntityId, Issue, StatusKey, SyncState};

use crate::error::CliError;

/// Longest wait for the socket before a mutation goes ahead without it.
const SOCKET_WAIT: Duration = Duration::from_secs(5);

/// Resolve an issue by key (case-insensitive) or id.
pub fn find_issue<'a>(board: &'a Board, identifier: &str) -> Result<(&'a Column, &'a Issue), CliError> {
    board
        .find_issue_by_key(identifier)
        .or_else(|| board.find_issue(&EntityId::from(identifier)))
        .ok_or_else(|| CliError::NotFound {
            resource_type: "issue".into(),
            identifier: identifier.into(),
            list_command: "board show".into(),
        })
}

/// Resolve a column by id, status key (`in_progress`) or name.
pub fn find_column<'a>(board: &'a Board, identifier: &str) -> Result<&'a Column, CliError> {
    let status = identifier.replace('-', "_").parse::<StatusKey>().ok();
    board
        .columns
        .iter()
        .find(|c| c.id.as_str() == identifier)
        .or_else(|| status.and_then(|s| board.column_for_status(s)))
        .or_else(|| {
            board
                .columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(identifier))
        })
        .ok_or_else(|| CliError::NotFound {
            resource_type: "column".into(),
            identifier: identifier.into(),
            list_command: "board show".into(),
        })
}

/// Give the socket a moment to open so a mutation reaches other clients.
pub async fn await_socket(session: &BoardSession) {
    if !session.config().sync_enabled {
        return;
    }
    let limit = session.config().timeout.min(SOCKET_WAIT);
    let mut state = session.sync_state();
    if !matches!(
        tokio::time::timeout(limit, state.wait_for(|s| *s == SyncState::Open)).await,
        Ok(Ok(_))
    ) {
        tracing::warn!("board socket not open; other clients will pick up the change on refresh");
    }
}

/// Human label for a socket state.
pub fn describe_sync(state: SyncState) -> String {
    match state {
        SyncState::Connecting => "connecting".into(),
        SyncState::Open => "live".into(),
        SyncState::Reconnecting { attempt } => format!("reconnecting (attempt {attempt})"),
        SyncState::Closed => "offline".into(),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
