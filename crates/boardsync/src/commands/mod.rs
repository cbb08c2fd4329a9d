//! Command dispatch: bridges CLI args -> board session -> output formatting.

pub mod board;
pub mod config_cmd;
pub mod issue;
pub mod util;

use boardsync_core::{BoardSession, SessionConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a board-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: SessionConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Board(args) => board::handle(config, args, global).await,
        Command::Issue(args) => issue::handle(config, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// Open a session, closing it again if the initial load fails.
pub(crate) async fn open_session(config: SessionConfig) -> Result<BoardSession, CliError> {
    let session = BoardSession::new(config)?;
    if let Err(e) = session.open().await {
        session.close().await;
        return Err(e.into());
    }
    Ok(session)
}
