//! Publishing the reconciled dataset
//!
//! The dataset is rendered once ([`render_records`]) and upserted to a
//! [`RecordStore`]: updated when the remote file exists (which requires its
//! current revision), created otherwise. "Does not exist" is a normal
//! outcome of [`RecordStore::fetch_revision`]; every other failure is an
//! error.

pub mod github;

pub use github::GithubContentsStore;

use crate::error::PublishError;
use crate::http::{retry, RetryPolicy};
use async_trait::async_trait;
use chrono::Utc;
use quake_common::record::records_to_json;
use quake_common::{EarthquakeRecord, QuakeError};
use tracing::info;

/// One create-or-update write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest<'a> {
    pub path: &'a str,
    pub body: &'a str,
    pub message: String,
    /// Revision being replaced; `None` creates the resource
    pub revision: Option<&'a str>,
}

/// Remote versioned file store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Current revision of `path`, or `None` when it does not exist
    async fn fetch_revision(&self, path: &str) -> Result<Option<String>, PublishError>;

    async fn put(&self, request: PutRequest<'_>) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Created,
    Updated,
}

impl std::fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishOutcome::Created => f.write_str("created"),
            PublishOutcome::Updated => f.write_str("updated"),
        }
    }
}

/// Render records in the published layout
pub fn render_records(records: &[EarthquakeRecord]) -> Result<String, QuakeError> {
    records_to_json(records)
}

/// Upserts rendered datasets with retry
pub struct Publisher {
    store: Box<dyn RecordStore>,
    retry: RetryPolicy,
}

impl Publisher {
    pub fn new(store: Box<dyn RecordStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Upsert `body` at `path`
    ///
    /// Each attempt re-reads the remote revision, so a conflicting concurrent
    /// write is resolved by the next attempt.
    pub async fn publish(&self, path: &str, body: &str) -> Result<PublishOutcome, PublishError> {
        let outcome = retry(&self.retry, "publish", || self.publish_once(path, body)).await?;
        info!(path = %path, outcome = %outcome, bytes = body.len(), "Published dataset");
        Ok(outcome)
    }

    async fn publish_once(&self, path: &str, body: &str) -> Result<PublishOutcome, PublishError> {
        let revision = self.store.fetch_revision(path).await?;
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let (message, outcome) = match revision {
            Some(_) => (format!("Auto update {}", now), PublishOutcome::Updated),
            None => (format!("First upload {}", now), PublishOutcome::Created),
        };

        self.store
            .put(PutRequest {
                path,
                body,
                message,
                revision: revision.as_deref(),
            })
            .await?;

        Ok(outcome)
    }
}
