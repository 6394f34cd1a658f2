//! Text encodings for enum and list columns.

use fleetsync_core::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Stores an enum as its bare serde name (`"ACTIVE"` → `ACTIVE`).
pub(crate) fn enum_to_db<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

pub(crate) fn enum_from_db<T: DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

pub(crate) fn list_to_db(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

/// Unreadable list columns read back as empty.
pub(crate) fn list_from_db(value: &str) -> Vec<String> {
    serde_json::from_str(value).unwrap_or_default()
}
