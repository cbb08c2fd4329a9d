//! Board command handlers.

use std::fmt::Write as _;
use std::sync::Arc;

use owo_colors::OwoColorize;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;

use boardsync_core::{Board, Column, Issue, SessionConfig};

use crate::cli::{BoardArgs, BoardCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::{open_session, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(super) struct IssueRow {
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Assignee")]
    assignee: String,
    #[tabled(rename = "Points")]
    points: String,
}

impl IssueRow {
    pub(super) fn new(column: &str, issue: &Issue) -> Self {
        Self {
            column: column.to_owned(),
            key: issue.key.clone(),
            title: issue.title.clone(),
            assignee: issue.assignee.clone().unwrap_or_default(),
            points: issue
                .story_points
                .map(|p| p.to_string())
                .unwrap_or_default(),
        }
    }
}

/// Heading line plus a per-column count summary and the issue table.
fn board_table(board: &Board, columns: &[&Column], color: bool) -> String {
    let mut out = String::new();
    let title = format!("{} (board {})", board.name, board.id);
    let _ = writeln!(
        out,
        "{}",
        if color {
            title.bold().to_string()
        } else {
            title
        }
    );

    let summary: Vec<String> = columns
        .iter()
        .map(|c| {
            output::paint_status(
                &format!("{} {}", c.name, c.issue_count),
                c.status_key,
                color,
            )
        })
        .collect();
    let _ = writeln!(out, "{}", summary.join("  |  "));

    let rows: Vec<IssueRow> = columns
        .iter()
        .flat_map(|c| c.issues.iter().map(move |i| IssueRow::new(&c.name, i)))
        .collect();
    if rows.is_empty() {
        out.push_str("(no issues)");
    } else {
        out.push_str(&output::render_table(&rows));
    }
    out
}

fn render_board(
    board: &Board,
    column: Option<&str>,
    global: &GlobalOpts,
) -> Result<String, CliError> {
    let filter = column.map(|ident| util::find_column(board, ident)).transpose()?;
    let columns: Vec<&Column> = match filter {
        Some(c) => vec![c],
        None => board.columns.iter().collect(),
    };
    let color = output::should_color(&global.color);

    match (&global.output, filter) {
        // A column filter narrows structured output to that column.
        (OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml, Some(c)) => {
            output::render_single(&global.output, c, |_| String::new(), |_| String::new())
        }
        _ => output::render_single(
            &global.output,
            board,
            |b| board_table(b, &columns, color),
            |_| {
                columns
                    .iter()
                    .flat_map(|c| c.issues.iter().map(|i| i.key.clone()))
                    .collect::<Vec<_>>()
                    .join("\n")
            },
        ),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    mut config: SessionConfig,
    args: BoardArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        BoardCommand::Show { column } => {
            config.sync_enabled = false;
            let session = open_session(config).await?;
            let board = session.board();
            session.close().await;

            let Some(board) = board else {
                return Err(CliError::SessionClosed);
            };
            let out = render_board(&board, column.as_deref(), global)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        BoardCommand::Watch => watch(config, global).await,
    }
}

/// Print the board, then again after every change, until Ctrl-C.
async fn watch(config: SessionConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let session = open_session(config).await?;
    let mut board = session.subscribe_board();
    let mut notices = session.notices();
    let mut sync = session.sync_state();
    let color = output::should_color(&global.color);

    let print = |snapshot: &Arc<Board>| -> Result<(), CliError> {
        let out = render_board(snapshot, None, global)?;
        if matches!(global.output, OutputFormat::Table) && !global.quiet {
            println!();
        }
        output::print_output(&out, global.quiet);
        Ok(())
    };

    if let Some(current) = board.current().cloned() {
        if let Err(e) = print(&current) {
            session.close().await;
            return Err(e);
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),

            changed = board.changed() => match changed {
                Some(Some(snapshot)) => {
                    if let Err(e) = print(&snapshot) {
                        break Err(e);
                    }
                }
                Some(None) => {}
                None => break Ok(()),
            },

            notice = notices.recv() => match notice {
                Ok(notice) => {
                    let line = format!("[{}] {}", notice.at.format("%H:%M:%S"), notice.message);
                    eprintln!("{}", output::paint_notice(&line, notice.level, color));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "notice receiver lagged");
                }
                Err(RecvError::Closed) => break Ok(()),
            },

            res = sync.changed() => {
                if res.is_err() {
                    break Ok(());
                }
                let state = *sync.borrow_and_update();
                if !global.quiet {
                    eprintln!("sync: {}", util::describe_sync(state));
                }
            }
        }
    };

    session.close().await;
    result
}
