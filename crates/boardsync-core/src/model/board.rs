// ── Board domain types ──
//
// A board is an ordered list of columns; each column owns an ordered
// list of issues. The column list is authoritative: an issue's
// `column_id` and `status` mirror the column that contains it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::EntityId;
use crate::error::CoreError;

/// The fixed set of workflow states a column can represent.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusKey {
    Todo,
    InProgress,
    InReview,
    Done,
}

impl StatusKey {
    /// Wire representation, e.g. `"in_progress"`.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub id: EntityId,
    /// Human-readable identifier such as `PRJ-42`.
    pub key: String,
    pub title: String,
    pub assignee: Option<String>,
    pub story_points: Option<u32>,
    pub status: StatusKey,
    pub column_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub id: EntityId,
    pub name: String,
    pub status_key: StatusKey,
    pub issues: Vec<Issue>,
    /// Always equal to `issues.len()`.
    pub issue_count: usize,
}

impl Column {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, status_key: StatusKey) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status_key,
            issues: Vec::new(),
            issue_count: 0,
        }
    }

    pub fn contains(&self, issue_id: &EntityId) -> bool {
        self.issues.iter().any(|i| &i.id == issue_id)
    }

    /// Append an issue, rewriting its back-reference and status.
    pub(crate) fn push(&mut self, mut issue: Issue) {
        issue.column_id = self.id.clone();
        issue.status = self.status_key;
        self.issues.push(issue);
        self.issue_count = self.issues.len();
    }

    /// Remove an issue by id, keeping the count in step.
    pub(crate) fn take(&mut self, issue_id: &EntityId) -> Option<Issue> {
        let idx = self.issues.iter().position(|i| &i.id == issue_id)?;
        let issue = self.issues.remove(idx);
        self.issue_count = self.issues.len();
        Some(issue)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    pub id: EntityId,
    pub name: String,
    pub project_id: EntityId,
    pub columns: Vec<Column>,
}

impl Board {
    pub fn column(&self, column_id: &EntityId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == column_id)
    }

    pub(crate) fn column_mut(&mut self, column_id: &EntityId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| &c.id == column_id)
    }

    /// First column carrying the given status.
    pub fn column_for_status(&self, status: StatusKey) -> Option<&Column> {
        self.columns.iter().find(|c| c.status_key == status)
    }

    /// Locate an issue and the column that holds it.
    pub fn find_issue(&self, issue_id: &EntityId) -> Option<(&Column, &Issue)> {
        self.columns.iter().find_map(|c| {
            c.issues
                .iter()
                .find(|i| &i.id == issue_id)
                .map(|issue| (c, issue))
        })
    }

    /// Look an issue up by its human-readable key (case-insensitive).
    pub fn find_issue_by_key(&self, key: &str) -> Option<(&Column, &Issue)> {
        self.columns.iter().find_map(|c| {
            c.issues
                .iter()
                .find(|i| i.key.eq_ignore_ascii_case(key))
                .map(|issue| (c, issue))
        })
    }

    pub fn total_issues(&self) -> usize {
        self.columns.iter().map(|c| c.issue_count).sum()
    }

    /// Verify the board invariants, reporting the first violation.
    ///
    /// - every issue appears in exactly one column
    /// - `issue_count` matches each column's list
    /// - each issue's status and column back-reference match its column
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();

        for column in &self.columns {
            if column.issue_count != column.issues.len() {
                return Err(CoreError::illegal(format!(
                    "column {} counts {} issues but holds {}",
                    column.id,
                    column.issue_count,
                    column.issues.len()
                )));
            }

            for issue in &column.issues {
                if !seen.insert(&issue.id) {
                    return Err(CoreError::illegal(format!(
                        "issue {} appears in more than one place",
                        issue.id
                    )));
                }
                if issue.status != column.status_key || issue.column_id != column.id {
                    return Err(CoreError::illegal(format!(
                        "issue {} is in column {} ({}) but claims {} ({})",
                        issue.id, column.id, column.status_key, issue.column_id, issue.status
                    )));
                }
            }
        }

        Ok(())
    }
}
