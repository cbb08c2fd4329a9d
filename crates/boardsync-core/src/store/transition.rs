// Pure board transitions. Each takes the current board by reference and
// returns the next one; the input is never touched.

use crate::error::CoreError;
use crate::model::{Board, EntityId, Issue};

fn unknown_column(board: &Board, column_id: &EntityId) -> CoreError {
    CoreError::illegal(format!("column {column_id} is not on board {}", board.id))
}

/// Move `issue_id` from `from` to the end of `to`.
///
/// Both columns must exist and `from` must hold the issue. A move onto
/// the same column returns a board equal to the input.
pub fn apply_move(
    board: &Board,
    issue_id: &EntityId,
    from: &EntityId,
    to: &EntityId,
) -> Result<Board, CoreError> {
    let source = board.column(from).ok_or_else(|| unknown_column(board, from))?;
    if board.column(to).is_none() {
        return Err(unknown_column(board, to));
    }
    if !source.contains(issue_id) {
        return Err(CoreError::illegal(format!(
            "issue {issue_id} is not in column {from}"
        )));
    }
    if from == to {
        return Ok(board.clone());
    }

    let mut next = board.clone();
    let issue = next
        .column_mut(from)
        .and_then(|c| c.take(issue_id))
        .ok_or_else(|| unknown_column(board, from))?;
    next.column_mut(to)
        .ok_or_else(|| unknown_column(board, to))?
        .push(issue);

    debug_assert!(next.check_invariants().is_ok());
    Ok(next)
}

/// Append a newly created issue to `column_id`.
pub fn append_issue(board: &Board, column_id: &EntityId, issue: Issue) -> Result<Board, CoreError> {
    if let Some((column, _)) = board.find_issue(&issue.id) {
        return Err(CoreError::illegal(format!(
            "issue {} already exists in column {}",
            issue.id, column.id
        )));
    }

    let mut next = board.clone();
    next.column_mut(column_id)
        .ok_or_else(|| unknown_column(board, column_id))?
        .push(issue);
    Ok(next)
}

/// Remove an issue from whichever column holds it.
pub fn remove_issue(board: &Board, issue_id: &EntityId) -> Result<Board, CoreError> {
    let mut next = board.clone();
    next.columns
        .iter_mut()
        .find_map(|c| c.take(issue_id))
        .ok_or_else(|| CoreError::illegal(format!("issue {issue_id} is not on the board")))?;
    Ok(next)
}
