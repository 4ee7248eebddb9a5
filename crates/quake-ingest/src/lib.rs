//! Quake Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Collects recent earthquake events from public feeds, merges them with the
//! previously published dataset and publishes the result.
//!
//! # Supported Data Sources
//!
//! - **Kandilli**: Kandilli Observatory fixed-layout listing
//! - **AFAD**: Disaster and Emergency Management Authority JSON feed
//!
//! # Example
//!
//! ```no_run
//! use quake_ingest::{IngestConfig, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let report = Pipeline::from_config(config, true)?.run().await?;
//!     println!("{} records", report.records_written());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod publish;
pub mod reconcile;
pub mod snapshot;
pub mod sources;

pub use config::{IngestConfig, PublishConfig};
pub use error::{ConfigError, FeedError, IngestError, PublishError, SnapshotError};
pub use pipeline::{Pipeline, RunReport, SourceFailure};
pub use publish::{PublishOutcome, Publisher, RecordStore};
pub use reconcile::{Reconciler, Reconciliation};
