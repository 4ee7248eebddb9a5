//! Source feeds
//!
//! Each feed is fetched and normalized into [`EarthquakeRecord`]s tagged with
//! its [`SourceTag`]. Feeds never deduplicate; that is the reconciler's job.
//!
//! - [`kandilli`]: fixed-layout text listing wrapped in an HTML page
//! - [`afad`]: JSON document with an `earthquakes` array

pub mod afad;
pub mod kandilli;

pub use afad::AfadSource;
pub use kandilli::KandilliSource;

use crate::error::FeedError;
use async_trait::async_trait;
use quake_common::{EarthquakeRecord, SourceTag};

/// A feed that produces one batch of records per run
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    /// Fetch and normalize the current batch, in feed order
    async fn fetch(&self) -> Result<Vec<EarthquakeRecord>, FeedError>;
}
