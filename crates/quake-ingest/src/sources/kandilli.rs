//! Kandilli Observatory listing
//!
//! The page is HTML with a single `<pre>` block holding a fixed-layout table:
//!
//! ```text
//! Date       Time      Latit(N)  Long(E)   Depth(km)     MD   ML   Mw    Region
//! ---------- --------  --------  -------   ----------    ------------    -----------
//! 2024.01.01 10:00:00  38.0000   27.0000        7.0      -.-  2.1  -.-   AKHISAR (MANISA)   İlksel
//! ```
//!
//! Columns are whitespace separated. The region may span several tokens and
//! the last token is the solution code.

use crate::error::FeedError;
use crate::http::{fetch_bytes, RetryPolicy};
use crate::sources::FeedSource;
use async_trait::async_trait;
use quake_common::record::{parse_coordinate, repair_mis_encoding};
use quake_common::{Depth, EarthquakeRecord, Magnitude, SourceTag};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};

/// Lines of banner and column headings before the first event row
pub const HEADER_LINES: usize = 7;

/// Date, time, lat, lon, depth, MD, ML, Mw, solution; region may be empty
pub const MIN_TOKENS: usize = 9;

const FEED: SourceTag = SourceTag::Kandilli;

/// Fetches and parses the Kandilli listing page
pub struct KandilliSource {
    client: Client,
    url: String,
    retry: RetryPolicy,
}

impl KandilliSource {
    pub fn new(client: Client, url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            url: url.into(),
            retry,
        }
    }
}

#[async_trait]
impl FeedSource for KandilliSource {
    fn tag(&self) -> SourceTag {
        FEED
    }

    async fn fetch(&self) -> Result<Vec<EarthquakeRecord>, FeedError> {
        info!(url = %self.url, "Fetching Kandilli listing");

        let bytes = fetch_bytes(&self.client, &self.url, &self.retry)
            .await
            .map_err(|source| FeedError::Fetch { feed: FEED, source })?;

        // The page is not reliably UTF-8; bad bytes become U+FFFD and are
        // repaired per field below.
        let html = String::from_utf8_lossy(&bytes);
        let listing = extract_listing(&html)?;
        let records = parse_listing(&listing);

        info!(records = records.len(), "Parsed Kandilli listing");
        Ok(records)
    }
}

/// Return the text of the first `<pre>` element
pub fn extract_listing(html: &str) -> Result<String, FeedError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("pre").map_err(|e| FeedError::parse(FEED, e.to_string()))?;

    document
        .select(&selector)
        .next()
        .map(|pre| pre.text().collect::<String>())
        .ok_or_else(|| FeedError::parse(FEED, "listing page has no <pre> block"))
}

/// Parse the listing text into records, in listing order
///
/// Rows that are too short or carry unparseable coordinates are dropped.
pub fn parse_listing(listing: &str) -> Vec<EarthquakeRecord> {
    let mut skipped = 0usize;

    let records: Vec<EarthquakeRecord> = listing
        .lines()
        .skip(HEADER_LINES)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let record = parse_line(line);
            if record.is_none() {
                skipped += 1;
            }
            record
        })
        .collect();

    if skipped > 0 {
        debug!(skipped, "Dropped malformed Kandilli rows");
    }

    records
}

/// Parse one listing row
pub fn parse_line(line: &str) -> Option<EarthquakeRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < MIN_TOKENS {
        return None;
    }

    let latitude = parse_coordinate("latitude", tokens[2]);
    let longitude = parse_coordinate("longitude", tokens[3]);
    let (latitude, longitude) = match (latitude, longitude) {
        (Ok(lat), Ok(lon)) => (lat, lon),
        (Err(e), _) | (_, Err(e)) => {
            debug!(error = %e, line = %line.trim(), "Skipping Kandilli row");
            return None;
        },
    };

    let last = tokens.len() - 1;
    let location = tokens[8..last].join(" ");

    Some(EarthquakeRecord {
        date: tokens[0].to_string(),
        time: tokens[1].to_string(),
        latitude,
        longitude,
        depth: Depth::Text(tokens[4].to_string()),
        magnitude: Magnitude::parse_token(tokens[6]),
        location: repair_mis_encoding(&location),
        solution: repair_mis_encoding(tokens[last]),
        source: Some(FEED.as_str().to_string()),
    })
}
