//! Quake Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared record model, error handling and logging for the earthquake
//! collector workspace.
//!
//! # Overview
//!
//! - **Record model**: [`EarthquakeRecord`] and the typed fields it carries
//! - **Error Handling**: [`QuakeError`] and the crate [`Result`] alias
//! - **Logging**: centralized `tracing` setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use quake_common::record::{records_from_json, IdentityKey};
//!
//! fn keys(json: &str) -> quake_common::Result<Vec<IdentityKey>> {
//!     let records = records_from_json(json)?;
//!     Ok(records.iter().map(|r| r.identity_key()).collect())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod record;

// Re-export commonly used types
pub use error::{QuakeError, Result};
pub use record::{Depth, EarthquakeRecord, IdentityKey, Magnitude, SourceTag};
