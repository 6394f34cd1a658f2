//! Flattening of raw upstream records into normalized domain records.
//!
//! Every `extract_*` function is pure. It returns `Err` when a record has an
//! unusable shape, and `Ok(None)` when the record is well formed but carries
//! no identity of its own. [`decode_page`] applies an extractor to a page and
//! turns both outcomes into counted skips.

mod asset_extract;
mod directory_extract;
mod location_extract;
mod telemetry_extract;

pub use asset_extract::{extract_asset, extract_tracking_person};
pub use directory_extract::{extract_directory_device, extract_directory_person, normalize_mac};
pub use location_extract::extract_location_sample;
pub use telemetry_extract::{battery_health_percent, extract_battery_sample, BatterySample};

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::upstream::RawRecord;

/// What happened to the records of one decoded page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeStats {
    pub decoded: usize,
    /// Records with an unexpected shape.
    pub malformed: usize,
    /// Well-formed records lacking their own identity.
    pub missing_identity: usize,
}

impl DecodeStats {
    pub fn absorb(&mut self, other: DecodeStats) {
        self.decoded += other.decoded;
        self.malformed += other.malformed;
        self.missing_identity += other.missing_identity;
    }

    pub fn skipped(&self) -> usize {
        self.malformed + self.missing_identity
    }
}

/// Runs `extract` over a page, logging and skipping records it cannot use.
pub fn decode_page<T, F>(source: &str, records: Vec<RawRecord>, extract: F) -> (Vec<T>, DecodeStats)
where
    F: Fn(&RawRecord) -> Result<Option<T>>,
{
    let mut stats = DecodeStats::default();
    let mut decoded = Vec::with_capacity(records.len());

    for (position, record) in records.iter().enumerate() {
        match extract(record) {
            Ok(Some(item)) => {
                stats.decoded += 1;
                decoded.push(item);
            }
            Ok(None) => stats.missing_identity += 1,
            Err(err) => {
                stats.malformed += 1;
                warn!(
                    "[Extract] skipping malformed {} record at position {}: {}",
                    source, position, err
                );
            }
        }
    }

    (decoded, stats)
}

/// Reads a raw record into its permissive typed view.
pub(crate) fn decode_raw<T: DeserializeOwned>(record: &RawRecord) -> Result<T> {
    if !record.is_object() {
        return Err(Error::validation(format!(
            "expected a JSON object, found {}",
            json_kind(record)
        )));
    }
    Ok(serde_json::from_value(record.clone())?)
}

fn json_kind(value: &RawRecord) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
