// Board REST client
//
// Wraps `reqwest::Client` with URL construction and status mapping for
// the agile board endpoints. No retries: every call fails fast and the
// caller decides what a failure means.

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::ids::EntityId;
use crate::models::{BoardResponse, CreateIssueRequest, IssueResponse, UpdateIssueStatusRequest};
use crate::transport::TransportConfig;

/// HTTP client for the agile board API.
///
/// All methods map non-2xx answers to typed [`Error`] variants before the
/// caller sees them.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the server root, e.g. `https://boards.example.com`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Fetch a board with all columns and issues.
    pub async fn get_board(&self, board_id: &EntityId) -> Result<BoardResponse, Error> {
        let url = self.api_url(&format!("boards/{board_id}/"))?;
        self.get(url).await
    }

    /// Set an issue's status. The response body is not inspected.
    pub async fn update_issue_status(&self, issue_id: &EntityId, status: &str) -> Result<(), Error> {
        let url = self.api_url(&format!("issues/{issue_id}/"))?;
        debug!("PUT {}", url);

        let resp = self
            .http
            .put(url)
            .json(&UpdateIssueStatusRequest { status })
            .send()
            .await?;

        check_status(resp).await.map(drop)
    }

    /// Create an issue in a project. The server places it in its default column.
    pub async fn create_issue(
        &self,
        project_id: &EntityId,
        title: &str,
    ) -> Result<IssueResponse, Error> {
        let url = self.api_url(&format!("projects/{project_id}/issues/"))?;
        self.post(url, &CreateIssueRequest { title }).await
    }

    /// Delete an issue.
    pub async fn delete_issue(&self, issue_id: &EntityId) -> Result<(), Error> {
        let url = self.api_url(&format!("issues/{issue_id}/"))?;
        debug!("DELETE {}", url);

        let resp = self.http.delete(url).send().await?;
        check_status(resp).await.map(drop)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/agile/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/agile/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        parse_json(resp).await
    }

    async fn post<T: DeserializeOwned>(&self, url: Url, body: &impl Serialize) -> Result<T, Error> {
        debug!("POST {}", url);

        let resp = self.http.post(url).json(body).send().await?;
        parse_json(resp).await
    }
}

/// Map a non-2xx response to an [`Error`], passing 2xx through.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    match status {
        StatusCode::NOT_FOUND => Err(Error::NotFound {
            path: resp.url().path().to_owned(),
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Authentication {
            status: status.as_u16(),
        }),
        _ => {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let resp = check_status(resp).await?;
    let body = resp.text().await?;

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
