//! Error types for the collector
//!
//! Each stage has its own error enum so the orchestrator can decide per kind
//! whether to fall back or abort. [`IngestError`] is what a run returns and
//! maps onto the process exit code.

use quake_common::{QuakeError, SourceTag};
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that may go away on a later attempt
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

// ============================================================================
// Fetch
// ============================================================================

/// A single HTTP GET that did not produce a usable body
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            },
        }
    }
}

// ============================================================================
// Feeds
// ============================================================================

/// A source feed could not be fetched or understood
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("{feed} fetch failed: {source}")]
    Fetch {
        feed: SourceTag,
        #[source]
        source: FetchError,
    },

    #[error("{feed} payload could not be parsed: {reason}")]
    Parse { feed: SourceTag, reason: String },
}

impl FeedError {
    pub fn parse(feed: SourceTag, reason: impl Into<String>) -> Self {
        Self::Parse {
            feed,
            reason: reason.into(),
        }
    }

    pub fn feed(&self) -> SourceTag {
        match self {
            FeedError::Fetch { feed, .. } | FeedError::Parse { feed, .. } => *feed,
        }
    }

    /// Short machine-readable kind for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::Fetch { .. } => "fetch",
            FeedError::Parse { .. } => "parse",
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// The previously published dataset could not be loaded
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("no snapshot at {0}")]
    Missing(PathBuf),

    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

// ============================================================================
// Publish
// ============================================================================

/// Upserting the dataset to the remote store failed
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publish request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("publish credential rejected (HTTP {0})")]
    Unauthorized(StatusCode),

    #[error("remote revision conflict (HTTP {status}): {body}")]
    Conflict { status: StatusCode, body: String },

    #[error("remote store returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unexpected response from remote store: {0}")]
    InvalidResponse(String),
}

impl Retryable for PublishError {
    fn is_retryable(&self) -> bool {
        match self {
            PublishError::Transport(_) | PublishError::Conflict { .. } => true,
            PublishError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            },
            PublishError::Unauthorized(_) | PublishError::InvalidResponse(_) => false,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {key} has invalid value '{value}'")]
    InvalidVar { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Run
// ============================================================================

/// Failure of a whole collector run
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Source(#[from] FeedError),

    #[error("every source failed ({0}); refusing to republish an unchanged dataset")]
    NoSources(String),

    #[error("failed to render dataset: {0}")]
    Render(#[from] QuakeError),

    #[error("failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl IngestError {
    /// Short machine-readable kind for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Config(_) => "config",
            IngestError::Client(_) => "client",
            IngestError::Source(_) | IngestError::NoSources(_) => "source",
            IngestError::Render(_) | IngestError::Output { .. } => "output",
            IngestError::Publish(_) => "publish",
        }
    }

    /// Process exit code; 0 is reserved for a completed run
    pub fn exit_code(&self) -> u8 {
        match self {
            IngestError::Config(_) => 2,
            IngestError::Source(_) | IngestError::NoSources(_) => 3,
            IngestError::Render(_) | IngestError::Output { .. } => 4,
            IngestError::Publish(_) => 5,
            IngestError::Client(_) => 1,
        }
    }
}
