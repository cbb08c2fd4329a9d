// ── API-to-domain type conversions ──
//
// Turns wire DTOs from boardsync-api into validated domain types. A
// board is normalized on the way in: counts are recomputed and every
// issue takes its status from the column that holds it.

use boardsync_api::{BoardResponse, ColumnResponse, IssueResponse};

use crate::error::CoreError;
use crate::model::{Board, Column, EntityId, Issue, StatusKey};

fn parse_status(raw: &str) -> Result<StatusKey, CoreError> {
    raw.parse().map_err(|_| CoreError::Protocol {
        message: format!("unknown status key '{raw}'"),
    })
}

fn issue_from_response(resp: IssueResponse, column: &Column) -> Issue {
    Issue {
        id: resp.id,
        key: resp.key,
        title: resp.title,
        assignee: resp.assignee,
        story_points: resp.story_points,
        status: column.status_key,
        column_id: column.id.clone(),
    }
}

fn column_from_response(resp: ColumnResponse) -> Result<Column, CoreError> {
    let mut column = Column::new(resp.id, resp.name, parse_status(&resp.status_key)?);

    if let Some(reported) = resp.issue_count {
        if usize::try_from(reported).ok() != Some(resp.issues.len()) {
            tracing::debug!(
                column = %column.id,
                reported,
                actual = resp.issues.len(),
                "server issue count disagrees with list; using list length"
            );
        }
    }

    for issue in resp.issues {
        let issue = issue_from_response(issue, &column);
        column.push(issue);
    }
    Ok(column)
}

/// Build a validated board from the API response.
///
/// Fails with `Protocol` for an unknown status key and `IllegalState`
/// if the same issue is listed in two columns.
pub fn board_from_response(resp: BoardResponse) -> Result<Board, CoreError> {
    let columns = resp
        .columns
        .into_iter()
        .map(column_from_response)
        .collect::<Result<Vec<_>, _>>()?;

    let board = Board {
        id: resp.id,
        name: resp.name,
        project_id: resp.project_id,
        columns,
    };
    board.check_invariants()?;
    Ok(board)
}

/// Decide where a freshly created issue goes and build its domain value.
///
/// The server's `column_id` wins when the board knows it, then the first
/// column matching the returned status, then the first column.
pub fn place_created_issue(
    board: &Board,
    resp: IssueResponse,
) -> Result<(EntityId, Issue), CoreError> {
    let by_id = resp.column_id.as_ref().and_then(|id| board.column(id));
    let by_status = || {
        resp.status
            .as_deref()
            .and_then(|s| s.parse::<StatusKey>().ok())
            .and_then(|s| board.column_for_status(s))
    };

    let column = by_id
        .or_else(by_status)
        .or_else(|| board.columns.first())
        .ok_or_else(|| CoreError::illegal(format!("board {} has no columns", board.id)))?;

    let column_id = column.id.clone();
    let issue = issue_from_response(resp, column);
    Ok((column_id, issue))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn issue_resp(id: u64, status: Option<&str>, column: Option<u64>) -> IssueResponse {
        IssueResponse {
            id: EntityId::from(id),
            key: format!("PRJ-{id}"),
            title: format!("Issue {id}"),
            assignee: None,
            story_points: Some(2),
            status: status.map(String::from),
            column_id: column.map(EntityId::from),
        }
    }

    fn board_resp() -> BoardResponse {
        BoardResponse {
            id: EntityId::from(1),
            name: "Board".into(),
            project_id: EntityId::from(9),
            columns: vec![
                ColumnResponse {
                    id: EntityId::from(10),
                    name: "To do".into(),
                    status_key: "todo".into(),
                    issue_count: Some(5),
                    // Server claims `done` for an issue sitting in `todo`.
                    issues: vec![issue_resp(100, Some("done"), Some(11))],
                },
                ColumnResponse {
                    id: EntityId::from(11),
                    name: "Done".into(),
                    status_key: "done".into(),
                    issue_count: None,
                    issues: vec![],
                },
            ],
        }
    }

    #[test]
    fn board_is_normalized_from_column_list() {
        let board = board_from_response(board_resp()).unwrap();

        let todo = &board.columns[0];
        assert_eq!(todo.issue_count, 1);
        assert_eq!(todo.issues[0].status, StatusKey::Todo);
        assert_eq!(todo.issues[0].column_id, EntityId::from(10));
        assert_eq!(board.columns[1].issue_count, 0);
        board.check_invariants().unwrap();
    }

    #[test]
    fn unknown_status_key_is_protocol_error() {
        let mut resp = board_resp();
        resp.columns[1].status_key = "archived".into();
        assert!(matches!(
            board_from_response(resp),
            Err(CoreError::Protocol { .. })
        ));
    }

    #[test]
    fn duplicate_issue_is_rejected() {
        let mut resp = board_resp();
        resp.columns[1].issues.push(issue_resp(100, None, None));
        assert!(board_from_response(resp).unwrap_err().is_illegal_state());
    }

    #[test]
    fn created_issue_prefers_server_column() {
        let board = board_from_response(board_resp()).unwrap();
        let (column, issue) = place_created_issue(&board, issue_resp(101, Some("todo"), Some(11))).unwrap();
        assert_eq!(column, EntityId::from(11));
        assert_eq!(issue.status, StatusKey::Done);
    }

    #[test]
    fn created_issue_falls_back_to_status_then_first_column() {
        let board = board_from_response(board_resp()).unwrap();

        let (column, _) = place_created_issue(&board, issue_resp(101, Some("done"), Some(99))).unwrap();
        assert_eq!(column, EntityId::from(11));

        let (column, issue) = place_created_issue(&board, issue_resp(102, None, None)).unwrap();
        assert_eq!(column, EntityId::from(10));
        assert_eq!(issue.column_id, EntityId::from(10));
    }
}
