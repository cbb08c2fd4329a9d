// Wire types for the agile board REST API.
//
// These mirror the JSON the server sends. Optional fields default so a
// sparse payload still decodes; domain validation happens in core.

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// `GET /api/agile/boards/{id}/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardResponse {
    pub id: EntityId,
    pub name: String,
    pub project_id: EntityId,
    #[serde(default)]
    pub columns: Vec<ColumnResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnResponse {
    pub id: EntityId,
    pub name: String,
    pub status_key: String,
    /// Server-side aggregate. Recomputed by the client on load.
    #[serde(default)]
    pub issue_count: Option<u64>,
    #[serde(default)]
    pub issues: Vec<IssueResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueResponse {
    pub id: EntityId,
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub story_points: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub column_id: Option<EntityId>,
}

/// `PUT /api/agile/issues/{id}/` body.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateIssueStatusRequest<'a> {
    pub status: &'a str,
}

/// `POST /api/agile/projects/{id}/issues/` body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateIssueRequest<'a> {
    pub title: &'a str,
}
