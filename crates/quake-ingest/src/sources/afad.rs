//! AFAD JSON feed
//!
//! The feed is an object with an `earthquakes` array. Each event carries an
//! epoch `timestamp` (UTC seconds) and coordinates; `depth`, `ml` and
//! `location` may be missing or null.

use crate::error::FeedError;
use crate::http::{fetch_bytes, RetryPolicy};
use crate::sources::FeedSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quake_common::record::{
    deserialize_coordinate, deserialize_nullable_depth, deserialize_nullable_string,
};
use quake_common::{Depth, EarthquakeRecord, Magnitude, SourceTag};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

const FEED: SourceTag = SourceTag::Afad;

/// Fetches and parses the AFAD feed
pub struct AfadSource {
    client: Client,
    url: String,
    retry: RetryPolicy,
}

impl AfadSource {
    pub fn new(client: Client, url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            url: url.into(),
            retry,
        }
    }
}

#[async_trait]
impl FeedSource for AfadSource {
    fn tag(&self) -> SourceTag {
        FEED
    }

    async fn fetch(&self) -> Result<Vec<EarthquakeRecord>, FeedError> {
        info!(url = %self.url, "Fetching AFAD feed");

        let bytes = fetch_bytes(&self.client, &self.url, &self.retry)
            .await
            .map_err(|source| FeedError::Fetch { feed: FEED, source })?;

        let records = parse_feed(&bytes)?;

        info!(records = records.len(), "Parsed AFAD feed");
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct AfadEvent {
    timestamp: f64,

    #[serde(deserialize_with = "deserialize_coordinate")]
    latitude: f64,

    #[serde(deserialize_with = "deserialize_coordinate")]
    longitude: f64,

    #[serde(default, deserialize_with = "deserialize_nullable_depth")]
    depth: Depth,

    #[serde(default)]
    ml: Magnitude,

    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    location: String,
}

impl AfadEvent {
    fn into_record(self) -> Option<EarthquakeRecord> {
        let occurred = utc_from_epoch(self.timestamp)?;

        Some(EarthquakeRecord {
            date: occurred.format(DATE_FORMAT).to_string(),
            time: occurred.format(TIME_FORMAT).to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            depth: self.depth,
            magnitude: self.ml,
            location: self.location,
            solution: String::new(),
            source: Some(FEED.as_str().to_string()),
        })
    }
}

/// Convert epoch seconds to UTC, dropping any fractional part
pub fn utc_from_epoch(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp(seconds.floor() as i64, 0)
}

/// Parse a feed document into records, in feed order
///
/// A document that is not a JSON object, or whose `earthquakes` field is not
/// an array, is a parse error. Individual malformed events are skipped.
pub fn parse_feed(body: &[u8]) -> Result<Vec<EarthquakeRecord>, FeedError> {
    let document: Value =
        serde_json::from_slice(body).map_err(|e| FeedError::parse(FEED, e.to_string()))?;

    let root = document
        .as_object()
        .ok_or_else(|| FeedError::parse(FEED, "top-level value is not an object"))?;

    let events = match root.get("earthquakes") {
        Some(Value::Array(events)) => events,
        None | Some(Value::Null) => {
            warn!("AFAD feed has no earthquakes array; treating as empty");
            return Ok(Vec::new());
        },
        Some(_) => return Err(FeedError::parse(FEED, "earthquakes is not an array")),
    };

    let mut records = Vec::with_capacity(events.len());

    for (index, event) in events.iter().enumerate() {
        match AfadEvent::deserialize(event) {
            Ok(event) => {
                let timestamp = event.timestamp;
                match event.into_record() {
                    Some(record) => records.push(record),
                    None => warn!(index, timestamp, "Skipping AFAD event with invalid timestamp"),
                }
            },
            Err(e) => warn!(index, error = %e, "Skipping malformed AFAD event"),
        }
    }

    Ok(records)
}
