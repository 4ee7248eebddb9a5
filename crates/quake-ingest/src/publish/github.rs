//! GitHub repository contents API as a [`RecordStore`]
//!
//! - `GET  /repos/{owner}/{repo}/contents/{path}?ref={branch}` -> `sha`
//! - `PUT  /repos/{owner}/{repo}/contents/{path}` with base64 content

use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::publish::{PutRequest, RecordStore};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Writes the dataset into a branch of a GitHub repository
pub struct GithubContentsStore {
    client: Client,
    api_base_url: String,
    repository: String,
    branch: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl GithubContentsStore {
    pub fn new(client: Client, config: &PublishConfig, token: impl Into<String>) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            repository: config.repository.clone(),
            branch: config.branch.clone(),
            token: token.into(),
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_base_url,
            self.repository,
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

async fn status_error(response: Response) -> PublishError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PublishError::Unauthorized(status),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            PublishError::Conflict { status, body }
        },
        _ => PublishError::Status { status, body },
    }
}

#[async_trait]
impl RecordStore for GithubContentsStore {
    async fn fetch_revision(&self, path: &str) -> Result<Option<String>, PublishError> {
        let url = self.contents_url(path);
        let response = self
            .authorized(self.client.get(&url))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(path = %path, "Remote dataset does not exist yet");
                Ok(None)
            },
            status if status.is_success() => {
                let entry: ContentsEntry = response
                    .json()
                    .await
                    .map_err(|e| PublishError::InvalidResponse(e.to_string()))?;
                debug!(path = %path, sha = %entry.sha, "Found remote dataset");
                Ok(Some(entry.sha))
            },
            // A lookup that fails for any reason other than absence must not
            // fall through to a blind create.
            _ => Err(status_error(response).await),
        }
    }

    async fn put(&self, request: PutRequest<'_>) -> Result<(), PublishError> {
        let payload = PutContents {
            message: &request.message,
            content: BASE64.encode(request.body.as_bytes()),
            branch: &self.branch,
            sha: request.revision,
        };

        let response = self
            .authorized(self.client.put(self.contents_url(request.path)))
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}
