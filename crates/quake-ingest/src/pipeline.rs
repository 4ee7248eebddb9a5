//! One collector run
//!
//! load snapshot -> fetch each source -> reconcile -> write local output ->
//! publish. The local file is written before the remote upsert; a crash in
//! between leaves the remote one run behind, and the next run republishes
//! from the local snapshot.

use crate::config::IngestConfig;
use crate::error::{FeedError, IngestError};
use crate::http::{build_client, RetryPolicy};
use crate::publish::{render_records, GithubContentsStore, PublishOutcome, Publisher};
use crate::reconcile::{ReconcileStats, Reconciler};
use crate::snapshot::{load_snapshot_or_empty, write_snapshot};
use crate::sources::{AfadSource, FeedSource, KandilliSource};
use quake_common::{EarthquakeRecord, SourceTag};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Records logged at debug level after reconciliation
const PREVIEW_RECORDS: usize = 5;

/// A source that contributed nothing to this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub feed: SourceTag,
    pub kind: &'static str,
    pub error: String,
}

impl SourceFailure {
    fn from_error(err: &FeedError) -> Self {
        Self {
            feed: err.feed(),
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

/// What a completed run did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot_records: usize,
    /// Records returned per successful source, in fetch order
    pub fetched: Vec<(SourceTag, usize)>,
    pub source_failures: Vec<SourceFailure>,
    pub stats: ReconcileStats,
    pub output_path: PathBuf,
    /// `None` on dry runs
    pub published: Option<PublishOutcome>,
    pub duration: Duration,
}

impl RunReport {
    pub fn records_written(&self) -> usize {
        self.stats.output
    }
}

/// Orchestrates feeds, reconciliation and publishing
pub struct Pipeline {
    config: IngestConfig,
    sources: Vec<Box<dyn FeedSource>>,
    reconciler: Reconciler,
    publisher: Option<Publisher>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit parts
    pub fn new(
        config: IngestConfig,
        sources: Vec<Box<dyn FeedSource>>,
        publisher: Option<Publisher>,
    ) -> Self {
        let reconciler = Reconciler::new(config.max_records);
        Self {
            config,
            sources,
            reconciler,
            publisher,
        }
    }

    /// Build the production pipeline: Kandilli then AFAD, publishing to
    /// GitHub unless `dry_run`
    ///
    /// The publish token is only required when publishing.
    pub fn from_config(config: IngestConfig, dry_run: bool) -> Result<Self, IngestError> {
        config.validate()?;

        let client = build_client(&config).map_err(IngestError::Client)?;
        let retry = RetryPolicy::from_config(&config);

        let sources: Vec<Box<dyn FeedSource>> = vec![
            Box::new(KandilliSource::new(client.clone(), config.kandilli_url.clone(), retry)),
            Box::new(AfadSource::new(client.clone(), config.afad_url.clone(), retry)),
        ];

        let publisher = if dry_run {
            info!("Dry run: remote publishing disabled");
            None
        } else {
            let token = config.publish_token()?;
            let store = GithubContentsStore::new(client, &config.publish, token);
            Some(Publisher::new(Box::new(store), retry))
        };

        Ok(Self::new(config, sources, publisher))
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Execute one run
    pub async fn run(&self) -> Result<RunReport, IngestError> {
        let started = Instant::now();
        info!(
            sources = self.sources.len(),
            max_records = self.reconciler.max_records(),
            output = %self.config.output_path.display(),
            publish = self.publisher.is_some(),
            "Starting collector run"
        );

        let snapshot = load_snapshot_or_empty(&self.config.output_path).await;
        let snapshot_records = snapshot.len();

        let (batches, fetched, source_failures) = self.fetch_sources().await?;

        let reconciliation = self.reconciler.reconcile(snapshot, batches);
        let stats = reconciliation.stats;
        info!(
            input = stats.input,
            invalid_timestamps = stats.invalid_timestamps,
            duplicates_removed = stats.duplicates_removed,
            truncated = stats.truncated,
            output = stats.output,
            "Reconciled records"
        );
        log_preview(&reconciliation.records);

        let body = render_records(&reconciliation.records)?;

        write_snapshot(&self.config.output_path, &body)
            .await
            .map_err(|source| IngestError::Output {
                path: self.config.output_path.clone(),
                source,
            })?;
        info!(
            path = %self.config.output_path.display(),
            records = stats.output,
            "Wrote local dataset"
        );

        let published = match &self.publisher {
            Some(publisher) => {
                Some(publisher.publish(&self.config.publish.remote_path, &body).await?)
            },
            None => None,
        };

        let report = RunReport {
            snapshot_records,
            fetched,
            source_failures,
            stats,
            output_path: self.config.output_path.clone(),
            published,
            duration: started.elapsed(),
        };

        info!(
            records = report.records_written(),
            failed_sources = report.source_failures.len(),
            published = ?report.published,
            duration_ms = report.duration.as_millis() as u64,
            "Collector run complete"
        );

        Ok(report)
    }

    /// Fetch every source in order, applying the failure policy
    async fn fetch_sources(
        &self,
    ) -> Result<(Vec<Vec<EarthquakeRecord>>, Vec<(SourceTag, usize)>, Vec<SourceFailure>), IngestError>
    {
        let mut batches = Vec::with_capacity(self.sources.len());
        let mut fetched = Vec::with_capacity(self.sources.len());
        let mut failures = Vec::new();

        for source in &self.sources {
            match source.fetch().await {
                Ok(records) => {
                    info!(feed = %source.tag(), records = records.len(), "Source fetched");
                    fetched.push((source.tag(), records.len()));
                    batches.push(records);
                },
                Err(err) if self.config.require_all_sources => {
                    return Err(IngestError::Source(err));
                },
                Err(err) => {
                    warn!(
                        feed = %err.feed(),
                        kind = err.kind(),
                        error = %err,
                        "Source failed; continuing without it"
                    );
                    failures.push(SourceFailure::from_error(&err));
                },
            }
        }

        if !self.sources.is_empty() && batches.is_empty() {
            let summary = failures
                .iter()
                .map(|f| format!("{}: {}", f.feed, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(IngestError::NoSources(summary));
        }

        Ok((batches, fetched, failures))
    }
}

fn log_preview(records: &[EarthquakeRecord]) {
    for (index, record) in records.iter().take(PREVIEW_RECORDS).enumerate() {
        debug!(
            index,
            date = %record.date,
            time = %record.time,
            latitude = record.latitude,
            longitude = record.longitude,
            magnitude = ?record.magnitude.value(),
            location = %record.location,
            source = record.source.as_deref().unwrap_or(""),
            "Reconciled record"
        );
    }
}
