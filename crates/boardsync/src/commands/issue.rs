//! Issue command handlers.

use std::sync::Arc;

use boardsync_core::{
    Board, BoardCommand as CoreCommand, BoardSession, Column, CommandOutcome, DragDropController,
    DragEvent, Issue, SessionConfig,
};

use crate::cli::{GlobalOpts, IssueArgs, IssueCommand};
use crate::error::CliError;
use crate::output;

use super::board::IssueRow;
use super::{open_session, util};

fn detail(issue: &Issue, column: Option<&Column>, color: bool) -> String {
    let status = output::paint_status(issue.status.as_str(), issue.status, color);
    [
        format!("Key:      {}", issue.key),
        format!("ID:       {}", issue.id),
        format!("Title:    {}", issue.title),
        format!(
            "Column:   {}",
            column.map_or_else(|| issue.column_id.to_string(), |c| c.name.clone())
        ),
        format!("Status:   {status}"),
        format!("Assignee: {}", issue.assignee.as_deref().unwrap_or("-")),
        format!(
            "Points:   {}",
            issue
                .story_points
                .map_or_else(|| "-".into(), |p| p.to_string())
        ),
    ]
    .join("\n")
}

fn loaded(session: &BoardSession) -> Result<Arc<Board>, CliError> {
    session.board().ok_or(CliError::SessionClosed)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    mut config: SessionConfig,
    args: IssueArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Reads never need the socket.
    if matches!(
        args.command,
        IssueCommand::List { .. } | IssueCommand::Get { .. }
    ) {
        config.sync_enabled = false;
    }
    let session = open_session(config).await?;
    let result = run(&session, args.command, global).await;
    session.close().await;
    result
}

async fn run(
    session: &BoardSession,
    command: IssueCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);

    match command {
        IssueCommand::List { column } => {
            let board = loaded(session)?;
            let columns: Vec<&Column> = match column.as_deref() {
                Some(ident) => vec![util::find_column(&board, ident)?],
                None => board.columns.iter().collect(),
            };
            let issues: Vec<&Issue> = columns.iter().flat_map(|c| c.issues.iter()).collect();
            let out = output::render_list(
                &global.output,
                &issues,
                |i| {
                    let name = board.column(&i.column_id).map_or("-", |c| c.name.as_str());
                    IssueRow::new(name, i)
                },
                |i| i.key.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        IssueCommand::Get { issue } => {
            let board = loaded(session)?;
            let (column, found) = util::find_issue(&board, &issue)?;
            let out = output::render_single(
                &global.output,
                found,
                |i| detail(i, Some(column), color),
                |i| i.key.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        IssueCommand::Move { issue, column } => {
            let board = loaded(session)?;
            let (source, found) = util::find_issue(&board, &issue)?;
            let target = util::find_column(&board, &column)?;

            // Same path a pointer drag takes: pick up, hover, drop.
            let mut drag = DragDropController::new();
            drag.handle(DragEvent::Start {
                issue_id: found.id.clone(),
                source: source.id.clone(),
            });
            drag.handle(DragEvent::Hover(Some(target.id.clone())));
            let outcome = match drag.handle(DragEvent::Drop) {
                Some(intent) => {
                    util::await_socket(session).await;
                    session
                        .request_move(intent)
                        .await?
                        .await
                        .map_err(|_| CliError::SessionClosed)??
                }
                None => CommandOutcome::Unchanged,
            };

            if !global.quiet {
                let name = output::paint_status(&target.name, target.status_key, color);
                if outcome == CommandOutcome::Unchanged {
                    eprintln!("{} is already in {name}", found.key);
                } else {
                    eprintln!("Moved {} to {name}", found.key);
                }
            }
            Ok(())
        }

        IssueCommand::Create { title } => {
            if title.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "title".into(),
                    reason: "title cannot be empty".into(),
                });
            }
            util::await_socket(session).await;
            let outcome = session.execute(CoreCommand::CreateIssue { title }).await?;
            if let CommandOutcome::Created { issue } = outcome {
                let board = session.board();
                let column = board
                    .as_deref()
                    .and_then(|b| b.column(&issue.column_id));
                let out = output::render_single(
                    &global.output,
                    &issue,
                    |i| detail(i, column, color),
                    |i| i.key.clone(),
                )?;
                output::print_output(&out, global.quiet);
            }
            Ok(())
        }

        IssueCommand::Delete { issue } => {
            let board = loaded(session)?;
            let (_, found) = util::find_issue(&board, &issue)?;
            if !util::confirm(&format!("Delete {} \"{}\"?", found.key, found.title), global.yes)? {
                return Ok(());
            }
            util::await_socket(session).await;
            session
                .execute(CoreCommand::DeleteIssue {
                    issue_id: found.id.clone(),
                })
                .await?;
            if !global.quiet {
                eprintln!("Deleted {}", found.key);
            }
            Ok(())
        }
    }
}
