use chrono::{DateTime, SecondsFormat, Utc};

use crate::devices::LocationFields;
use crate::errors::Result;
use crate::upstream::{LocationRaw, RawRecord};

use super::decode_raw;

/// Normalizes a location-service sighting. Epoch `lastSeen` values become RFC3339.
pub fn extract_location_sample(record: &RawRecord) -> Result<Option<LocationFields>> {
    let raw: LocationRaw = decode_raw(record)?;

    let last_seen = raw.last_seen.as_ref().and_then(last_seen_timestamp);
    if last_seen.is_none() && raw.ap_name.is_none() && raw.network_name.is_none() {
        return Ok(None);
    }

    Ok(Some(LocationFields {
        last_seen,
        ap_name: raw.ap_name,
        network_name: raw.network_name.or(raw.ssid),
    }))
}

fn last_seen_timestamp(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => {
            let seconds = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::<Utc>::from_timestamp(seconds, 0)
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        }
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn epoch_last_seen_becomes_rfc3339() {
        let fields = extract_location_sample(&json!({
            "lastSeen": 1767225600,
            "apName": "North-AP-12",
            "networkName": "North High"
        }))
        .expect("extract")
        .expect("fields");
        assert_eq!(fields.last_seen.as_deref(), Some("2026-01-01T00:00:00Z"));
        assert_eq!(fields.ap_name.as_deref(), Some("North-AP-12"));
    }

    #[test]
    fn empty_sighting_yields_nothing() {
        assert!(extract_location_sample(&json!({"ssid": null}))
            .expect("extract")
            .is_none());
    }
}
