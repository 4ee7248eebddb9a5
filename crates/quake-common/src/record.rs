//! Earthquake record model
//!
//! [`EarthquakeRecord`] is the single normalized shape every feed is mapped
//! into and the element type of the published JSON array. The serde field
//! names (`Tarih`, `Saat`, `Enlem`, ...) are the public schema read by the
//! mobile client and must not change.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{QuakeError, Result};

/// Token the Kandilli listing prints for a magnitude it did not compute
pub const MISSING_MAGNITUDE_TOKEN: &str = "-.-";

/// Replacement character left behind when the listing is decoded as UTF-8
pub const MIS_ENCODED_CHAR: char = '\u{FFFD}';

/// Letter the replacement character stands for in the listing
pub const REPAIRED_CHAR: &str = "İ";

// ============================================================================
// Source tag
// ============================================================================

/// Feed a record was collected from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    /// Kandilli Observatory text listing
    Kandilli,
    /// AFAD JSON feed
    Afad,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Kandilli => "Kandilli",
            SourceTag::Afad => "AFAD",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Depth
// ============================================================================

/// Hypocenter depth as reported by the feed
///
/// The listing prints depth as text while the JSON feed sends a number, and
/// both shapes already exist in published snapshots, so neither is coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Depth {
    Number(f64),
    Text(String),
}

impl Default for Depth {
    fn default() -> Self {
        Depth::Text(String::new())
    }
}

impl From<f64> for Depth {
    fn from(value: f64) -> Self {
        Depth::Number(value)
    }
}

impl From<&str> for Depth {
    fn from(value: &str) -> Self {
        Depth::Text(value.to_string())
    }
}

// ============================================================================
// Magnitude
// ============================================================================

/// Local magnitude (ML); `Unknown` is published as `null`, never as zero
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Magnitude {
    Known(f64),
    #[default]
    Unknown,
}

impl Magnitude {
    /// Parse a textual magnitude token
    ///
    /// Accepts `,` as decimal separator. The `-.-` sentinel, blanks and
    /// anything non-numeric map to `Unknown`.
    pub fn parse_token(token: &str) -> Self {
        let token = token.trim();
        if token.is_empty() || token == MISSING_MAGNITUDE_TOKEN {
            return Magnitude::Unknown;
        }

        Magnitude::from(token.replace(',', ".").parse::<f64>().ok())
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Magnitude::Known(v) => Some(v),
            Magnitude::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Magnitude::Known(_))
    }
}

impl From<Option<f64>> for Magnitude {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Magnitude::Known(v),
            _ => Magnitude::Unknown,
        }
    }
}

impl Serialize for Magnitude {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Magnitude::Known(v) => serializer.serialize_f64(*v),
            Magnitude::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Magnitude {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
            None => Magnitude::Unknown,
            Some(NumberOrText::Number(v)) => Magnitude::from(Some(v)),
            Some(NumberOrText::Text(s)) => Magnitude::parse_token(&s),
        })
    }
}

// ============================================================================
// Flexible field helpers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Parse a coordinate token, rejecting anything that is not a finite number
pub fn parse_coordinate(field: &'static str, token: &str) -> Result<f64> {
    match token.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(QuakeError::InvalidCoordinate {
            field,
            value: token.to_string(),
        }),
    }
}

/// Deserialize a coordinate sent either as a JSON number or a numeric string
pub fn deserialize_coordinate<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(v) => Ok(v),
        NumberOrText::Text(s) => {
            parse_coordinate("coordinate", &s).map_err(serde::de::Error::custom)
        },
    }
}

/// Deserialize a string treating `null` as empty
pub fn deserialize_nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize a depth treating `null` as the empty default
pub fn deserialize_nullable_depth<'de, D>(deserializer: D) -> std::result::Result<Depth, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Depth>::deserialize(deserializer)?.unwrap_or_default())
}

/// Replace the mis-decoded placeholder with the letter it stands for
pub fn repair_mis_encoding(text: &str) -> String {
    text.replace(MIS_ENCODED_CHAR, REPAIRED_CHAR)
}

// ============================================================================
// Earthquake record
// ============================================================================

/// One reported seismic event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarthquakeRecord {
    /// Calendar date as printed by the source (e.g. "2024.01.01" or "2024-01-01")
    #[serde(rename = "Tarih")]
    pub date: String,

    /// Time of day as printed by the source (e.g. "10:00:00")
    #[serde(rename = "Saat")]
    pub time: String,

    #[serde(rename = "Enlem", deserialize_with = "deserialize_coordinate")]
    pub latitude: f64,

    #[serde(rename = "Boylam", deserialize_with = "deserialize_coordinate")]
    pub longitude: f64,

    #[serde(
        rename = "Derinlik",
        default,
        deserialize_with = "deserialize_nullable_depth"
    )]
    pub depth: Depth,

    #[serde(rename = "ML", default)]
    pub magnitude: Magnitude,

    #[serde(
        rename = "Yer",
        default,
        deserialize_with = "deserialize_nullable_string"
    )]
    pub location: String,

    /// Solution quality code ("İlksel", "REVIZE01", ...)
    #[serde(
        rename = "Cozum",
        default,
        deserialize_with = "deserialize_nullable_string"
    )]
    pub solution: String,

    /// Originating feed; absent in snapshots written before tagging existed
    #[serde(rename = "Kaynak", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl EarthquakeRecord {
    /// Create a record with the required fields and defaults for the rest
    pub fn new(
        date: impl Into<String>,
        time: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
            latitude,
            longitude,
            depth: Depth::default(),
            magnitude: Magnitude::Unknown,
            location: String::new(),
            solution: String::new(),
            source: None,
        }
    }

    pub fn with_depth(mut self, depth: impl Into<Depth>) -> Self {
        self.depth = depth.into();
        self
    }

    pub fn with_magnitude(mut self, magnitude: Magnitude) -> Self {
        self.magnitude = magnitude;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = solution.into();
        self
    }

    pub fn with_source(mut self, source: SourceTag) -> Self {
        self.source = Some(source.as_str().to_string());
        self
    }

    /// Key used to recognize reports of the same physical event
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.date, &self.time, self.latitude, self.longitude)
    }
}

/// Composite identity `(date, time, latitude, longitude)`
///
/// Coordinates compare bitwise so the key can be hashed; `-0.0` is folded
/// into `0.0` to keep numeric equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    date: String,
    time: String,
    latitude_bits: u64,
    longitude_bits: u64,
}

impl IdentityKey {
    pub fn new(date: &str, time: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            date: date.to_string(),
            time: time.to_string(),
            latitude_bits: coordinate_bits(latitude),
            longitude_bits: coordinate_bits(longitude),
        }
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}, {})",
            self.date,
            self.time,
            f64::from_bits(self.latitude_bits),
            f64::from_bits(self.longitude_bits)
        )
    }
}

fn coordinate_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

// ============================================================================
// JSON document helpers
// ============================================================================

/// Parse a published JSON array of records
pub fn records_from_json(json: &str) -> Result<Vec<EarthquakeRecord>> {
    Ok(serde_json::from_str(json)?)
}

/// Render records as a two-space indented JSON array
///
/// Non-ASCII text (Turkish place names) is written as-is, not `\u` escaped.
pub fn records_to_json(records: &[EarthquakeRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}
