//! Permissive typed views of upstream payloads.
//!
//! Every field is optional and every nested value is read leniently: a value
//! of the wrong shape (a string where an object was expected, a number where a
//! string was expected) degrades to `None` or to its string form instead of
//! rejecting the whole record.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Deserializes any value into `T`, yielding `None` on a shape mismatch.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

/// Reads strings, numbers and booleans as a trimmed string; empty becomes `None`.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_as_string(&value))
}

/// Reads integers that may arrive as JSON strings (`"5234"`).
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match &value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

/// Reads booleans that may arrive as `"true"`/`"false"` or 0/1.
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match &value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => n.as_i64().map(|v| v != 0),
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

pub fn value_as_string(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Converts a JSON number or numeric string into an exact decimal.
///
/// Numbers go through their textual form so `42.50` never picks up binary
/// floating point noise.
pub fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().trim_start_matches('$').replace(',', ""),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

// ── Directory ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryNetworkRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub ip_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub wan_ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRecentUserRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryDeviceRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub annotated_user: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub annotated_location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub annotated_asset_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub org_unit_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mac_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ethernet_mac_address: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_known_network: Option<Vec<DirectoryNetworkRaw>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub os_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub platform_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub firmware_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub boot_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub auto_update_through: Option<String>,
    /// Epoch milliseconds, usually sent as a string.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub auto_update_expiration: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_sync: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub recent_users: Option<Vec<DirectoryRecentUserRaw>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryNameRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub given_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub family_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryStudentDataRaw {
    #[serde(
        default,
        alias = "Student_ID",
        alias = "StudentID",
        deserialize_with = "lenient_string"
    )]
    pub student_id: Option<String>,
    #[serde(
        default,
        alias = "Grade",
        deserialize_with = "lenient_string"
    )]
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryCustomSchemasRaw {
    #[serde(default, rename = "Student_Data", deserialize_with = "lenient")]
    pub student_data: Option<DirectoryStudentDataRaw>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUserRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub primary_email: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<DirectoryNameRaw>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub org_unit_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_admin: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub suspended: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_login_time: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub custom_schemas: Option<DirectoryCustomSchemasRaw>,
}

// ── Telemetry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryStatusReportRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub report_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub battery_health: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub full_charge_capacity: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub cycle_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryInfoRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub manufacturer: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub design_capacity: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryDeviceRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub battery_status_report: Option<Vec<BatteryStatusReportRaw>>,
    #[serde(default, deserialize_with = "lenient")]
    pub battery_info: Option<Vec<BatteryInfoRaw>>,
}

// ── Asset service ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NamedRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssetModelRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub category: Option<NamedRaw>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssetOwnerRaw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub school_id_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssetRaw {
    #[serde(default, alias = "AssetID", deserialize_with = "lenient_string")]
    pub asset_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub asset_tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<AssetModelRaw>,
    #[serde(default, deserialize_with = "lenient")]
    pub owner: Option<AssetOwnerRaw>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<NamedRaw>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub room_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location_room_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<NamedRaw>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackingUserRaw {
    #[serde(default, alias = "UserID", deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<NamedRaw>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub school_id_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub grade: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_active: Option<bool>,
}

// ── Location service ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRaw {
    /// Epoch seconds or an ISO timestamp.
    #[serde(default)]
    pub last_seen: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ap_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub network_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ssid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ip_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn owner_of_wrong_shape_degrades_to_none() {
        let raw: AssetRaw = serde_json::from_value(json!({
            "AssetId": "a-1",
            "Owner": "Not assigned",
            "Model": {"Name": "Chromebook 3100", "Category": 7}
        }))
        .expect("permissive decode");
        assert!(raw.owner.is_none());
        let model = raw.model.expect("model");
        assert_eq!(model.name.as_deref(), Some("Chromebook 3100"));
        assert!(model.category.is_none());
    }

    #[test]
    fn numeric_identifiers_become_strings() {
        let raw: TrackingUserRaw = serde_json::from_value(json!({
            "UserId": "u-1",
            "SchoolIdNumber": 555,
            "Grade": 9,
            "IsActive": "true"
        }))
        .expect("decode");
        assert_eq!(raw.school_id_number.as_deref(), Some("555"));
        assert_eq!(raw.grade.as_deref(), Some("9"));
        assert_eq!(raw.is_active, Some(true));
    }

    #[test]
    fn blank_strings_are_absent() {
        let raw: DirectoryDeviceRaw =
            serde_json::from_value(json!({"deviceId": "d1", "serialNumber": "   "})).expect("decode");
        assert!(raw.serial_number.is_none());
    }

    #[test]
    fn decimal_from_json_keeps_exact_cents() {
        assert_eq!(decimal_from_json(&json!(42.50)), Some(dec!(42.5)));
        assert_eq!(decimal_from_json(&json!("$1,250.10")), Some(dec!(1250.10)));
        assert_eq!(decimal_from_json(&json!(0.1)), Some(dec!(0.1)));
        assert_eq!(decimal_from_json(&json!(null)), None);
    }
}
