//! Merging, deduplication and retention
//!
//! Ordering policy, applied consistently:
//!
//! 1. Inputs are concatenated snapshot first, then each batch in call order.
//! 2. Records are stably sorted **newest first** by the timestamp derived from
//!    `date` + `time`. Records whose timestamp does not parse are kept but
//!    sort after every valid one.
//! 3. The first record per identity key wins. Duplicates share date and time,
//!    so the winner is always the earliest-arriving copy: the snapshot beats
//!    a re-fetch, and an earlier batch beats a later one.
//! 4. The first `max_records` survive; the oldest (and unparseable) records
//!    are the ones truncated.

use chrono::NaiveDateTime;
use quake_common::{EarthquakeRecord, IdentityKey};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Default retention cap for the published dataset
pub const DEFAULT_MAX_RECORDS: usize = 1000;

/// Formats tried, in order, against `"{date} {time}"`
///
/// `%.f` also matches when no fractional part is present.
pub const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y.%m.%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M",
];

/// Sortable time computed from a record's date and time strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedTimestamp {
    Valid(NaiveDateTime),
    Invalid,
}

impl DerivedTimestamp {
    pub fn derive(date: &str, time: &str) -> Self {
        let combined = format!("{} {}", date.trim(), time.trim());

        TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&combined, format).ok())
            .map_or(DerivedTimestamp::Invalid, DerivedTimestamp::Valid)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, DerivedTimestamp::Valid(_))
    }

    /// Newest first, invalid last
    fn priority_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DerivedTimestamp::Valid(a), DerivedTimestamp::Valid(b)) => b.cmp(a),
            (DerivedTimestamp::Valid(_), DerivedTimestamp::Invalid) => Ordering::Less,
            (DerivedTimestamp::Invalid, DerivedTimestamp::Valid(_)) => Ordering::Greater,
            (DerivedTimestamp::Invalid, DerivedTimestamp::Invalid) => Ordering::Equal,
        }
    }
}

/// Counters describing one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Records across snapshot and batches
    pub input: usize,
    pub invalid_timestamps: usize,
    pub duplicates_removed: usize,
    /// Unique records dropped by the retention cap
    pub truncated: usize,
    pub output: usize,
}

/// Result of [`Reconciler::reconcile`]
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub records: Vec<EarthquakeRecord>,
    pub stats: ReconcileStats,
}

/// Merges a snapshot with new batches into the next published dataset
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    max_records: usize,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORDS)
    }
}

struct Stamped {
    derived: DerivedTimestamp,
    record: EarthquakeRecord,
}

impl Reconciler {
    pub fn new(max_records: usize) -> Self {
        Self { max_records }
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Reconcile `snapshot` with `batches`
    ///
    /// Pure: the output depends only on the arguments.
    pub fn reconcile<I>(&self, snapshot: Vec<EarthquakeRecord>, batches: I) -> Reconciliation
    where
        I: IntoIterator<Item = Vec<EarthquakeRecord>>,
    {
        let mut stats = ReconcileStats::default();

        let mut stamped: Vec<Stamped> = std::iter::once(snapshot)
            .chain(batches)
            .flatten()
            .map(|record| Stamped {
                derived: DerivedTimestamp::derive(&record.date, &record.time),
                record,
            })
            .collect();

        stats.input = stamped.len();
        stats.invalid_timestamps = stamped.iter().filter(|s| !s.derived.is_valid()).count();

        // Stable: equal timestamps keep arrival order
        stamped.sort_by(|a, b| a.derived.priority_cmp(&b.derived));

        let mut seen: HashSet<IdentityKey> = HashSet::with_capacity(stamped.len());
        let unique: Vec<EarthquakeRecord> = stamped
            .into_iter()
            .filter(|s| seen.insert(s.record.identity_key()))
            .map(|s| s.record)
            .collect();

        stats.duplicates_removed = stats.input - unique.len();
        stats.truncated = unique.len().saturating_sub(self.max_records);

        let records: Vec<EarthquakeRecord> = unique.into_iter().take(self.max_records).collect();
        stats.output = records.len();

        Reconciliation { records, stats }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use quake_common::SourceTag;

    fn record(date: &str, time: &str, lat: f64, lon: f64) -> EarthquakeRecord {
        EarthquakeRecord::new(date, time, lat, lon)
    }

    #[test]
    fn test_derive_timestamp_formats() {
        assert!(DerivedTimestamp::derive("2024-01-01", "10:00:00").is_valid());
        assert!(DerivedTimestamp::derive("2024.01.01", "10:00:00").is_valid());
        assert!(DerivedTimestamp::derive("2024/01/01", "10:00:00.25").is_valid());
        assert!(DerivedTimestamp::derive("2025-10-29", "12:00").is_valid());
        assert_eq!(
            DerivedTimestamp::derive("2024.01.01", "10:00:00"),
            DerivedTimestamp::derive("2024-01-01", "10:00:00")
        );
    }

    #[test]
    fn test_derive_timestamp_invalid() {
        assert_eq!(DerivedTimestamp::derive("yesterday", "noon"), DerivedTimestamp::Invalid);
        assert_eq!(DerivedTimestamp::derive("2024-02-30", "10:00:00"), DerivedTimestamp::Invalid);
        assert_eq!(DerivedTimestamp::derive("", ""), DerivedTimestamp::Invalid);
    }

    #[test]
    fn test_sorts_newest_first() {
        let batch = vec![
            record("2024-01-01", "08:00:00", 1.0, 1.0),
            record("2024-01-01", "10:00:00", 2.0, 2.0),
            record("2023-12-31", "23:59:59", 3.0, 3.0),
            record("2024-01-01", "09:00:00", 4.0, 4.0),
        ];

        let result = Reconciler::new(10).reconcile(Vec::new(), vec![batch]);
        let times: Vec<_> = result
            .records
            .iter()
            .map(|r| format!("{} {}", r.date, r.time))
            .collect();

        assert_eq!(
            times,
            vec![
                "2024-01-01 10:00:00",
                "2024-01-01 09:00:00",
                "2024-01-01 08:00:00",
                "2023-12-31 23:59:59",
            ]
        );
    }

    #[test]
    fn test_invalid_timestamps_sort_last_and_are_kept() {
        let batch = vec![
            record("??", "??", 1.0, 1.0),
            record("2024-01-01", "08:00:00", 2.0, 2.0),
        ];

        let result = Reconciler::new(10).reconcile(Vec::new(), vec![batch]);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].latitude, 2.0);
        assert_eq!(result.records[1].date, "??");
        assert_eq!(result.stats.invalid_timestamps, 1);
    }

    #[test]
    fn test_cross_source_duplicate_earlier_batch_wins() {
        let kandilli = record("2024-01-01", "10:00:00", 38.0, 27.0)
            .with_location("AKHISAR (MANISA)")
            .with_source(SourceTag::Kandilli);
        let afad = record("2024-01-01", "10:00:00", 38.0, 27.0)
            .with_location("Akhisar (Manisa)")
            .with_source(SourceTag::Afad);

        let result =
            Reconciler::new(10).reconcile(Vec::new(), vec![vec![kandilli.clone()], vec![afad]]);

        assert_eq!(result.records, vec![kandilli]);
        assert_eq!(result.stats.duplicates_removed, 1);
    }

    #[test]
    fn test_snapshot_copy_wins_over_refetch() {
        let published = record("2024-01-01", "10:00:00", 38.0, 27.0).with_location("old");
        let refetched = record("2024-01-01", "10:00:00", 38.0, 27.0).with_location("new");

        let result = Reconciler::new(10).reconcile(vec![published.clone()], vec![vec![refetched]]);
        assert_eq!(result.records, vec![published]);
    }

    #[test]
    fn test_same_instant_different_place_is_not_duplicate() {
        let batch = vec![
            record("2024-01-01", "10:00:00", 38.0, 27.0),
            record("2024-01-01", "10:00:00", 38.0, 27.5),
        ];

        let result = Reconciler::new(10).reconcile(Vec::new(), vec![batch]);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.stats.duplicates_removed, 0);
    }

    #[test]
    fn test_cap_drops_oldest() {
        let n = 3;
        let batch: Vec<_> = (0..(n + 5))
            .map(|i| record("2024-01-01", &format!("10:{:02}:00", i), i as f64, 0.0))
            .collect();

        let result = Reconciler::new(n).reconcile(Vec::new(), vec![batch]);

        assert_eq!(result.records.len(), n);
        let minutes: Vec<_> = result.records.iter().map(|r| r.time.clone()).collect();
        assert_eq!(minutes, vec!["10:07:00", "10:06:00", "10:05:00"]);
        assert_eq!(result.stats.truncated, 5);
        assert_eq!(result.stats.output, n);
    }

    #[test]
    fn test_cap_applies_after_dedup() {
        let batch: Vec<_> = (0..4)
            .map(|i| record("2024-01-01", &format!("10:0{}:00", i), 1.0, 1.0))
            .collect();
        let duplicate_batch = batch.clone();

        let result = Reconciler::new(4).reconcile(Vec::new(), vec![batch, duplicate_batch]);
        assert_eq!(result.records.len(), 4);
        assert_eq!(result.stats.duplicates_removed, 4);
        assert_eq!(result.stats.truncated, 0);
    }

    #[test]
    fn test_zero_cap() {
        let result = Reconciler::new(0)
            .reconcile(vec![record("2024-01-01", "10:00:00", 1.0, 1.0)], Vec::<Vec<_>>::new());
        assert!(result.records.is_empty());
        assert_eq!(result.stats.truncated, 1);
    }

    #[test]
    fn test_empty_inputs() {
        let result = Reconciler::default().reconcile(Vec::new(), Vec::<Vec<EarthquakeRecord>>::new());
        assert!(result.records.is_empty());
        assert_eq!(result.stats, ReconcileStats::default());
    }
}
