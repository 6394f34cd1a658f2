use chrono::{DateTime, Utc};

use crate::devices::{DeviceLifecycle, DirectoryDevice};
use crate::errors::Result;
use crate::people::DirectoryPerson;
use crate::upstream::{DirectoryDeviceRaw, DirectoryUserRaw, RawRecord};

use super::decode_raw;

/// Normalizes one directory device. Devices without a device id are unusable.
pub fn extract_directory_device(record: &RawRecord) -> Result<Option<DirectoryDevice>> {
    let raw: DirectoryDeviceRaw = decode_raw(record)?;
    let Some(device_id) = raw.device_id else {
        return Ok(None);
    };

    let network = raw
        .last_known_network
        .and_then(|entries| entries.into_iter().next())
        .unwrap_or_default();

    let auto_update_expiration = raw
        .auto_update_through
        .map(|through| through.chars().take(10).collect::<String>())
        .or_else(|| raw.auto_update_expiration.and_then(date_from_epoch_millis));

    Ok(Some(DirectoryDevice {
        device_id,
        serial_number: raw.serial_number,
        model: raw.model,
        status: raw
            .status
            .as_deref()
            .map(DeviceLifecycle::from_directory)
            .unwrap_or_default(),
        annotated_user: raw.annotated_user.map(|user| user.to_lowercase()),
        annotated_location: raw.annotated_location,
        annotated_asset_id: raw.annotated_asset_id,
        org_unit_path: raw.org_unit_path,
        mac_address: raw.mac_address.as_deref().map(normalize_mac),
        ethernet_mac: raw.ethernet_mac_address.as_deref().map(normalize_mac),
        ip_address: network.ip_address,
        wan_ip_address: network.wan_ip_address,
        os_version: raw.os_version,
        platform_version: raw.platform_version,
        firmware_version: raw.firmware_version,
        boot_mode: raw.boot_mode,
        auto_update_expiration,
        last_sync: raw.last_sync,
        recent_users: raw
            .recent_users
            .unwrap_or_default()
            .into_iter()
            .filter_map(|user| user.email)
            .collect(),
    }))
}

/// Normalizes one directory account.
pub fn extract_directory_person(record: &RawRecord) -> Result<Option<DirectoryPerson>> {
    let raw: DirectoryUserRaw = decode_raw(record)?;
    let Some(directory_user_id) = raw.id else {
        return Ok(None);
    };

    let name = raw.name.unwrap_or_default();
    let student = raw
        .custom_schemas
        .and_then(|schemas| schemas.student_data)
        .unwrap_or_default();

    Ok(Some(DirectoryPerson {
        directory_user_id,
        email: raw.primary_email,
        full_name: name.full_name,
        first_name: name.given_name,
        last_name: name.family_name,
        org_unit_path: raw.org_unit_path,
        is_admin: raw.is_admin.unwrap_or(false),
        is_suspended: raw.suspended.unwrap_or(false),
        last_login: raw.last_login_time,
        student_id: student.student_id,
        student_grade: student.grade,
    }))
}

/// Lower-cases a MAC and, when it has exactly twelve hex digits, re-groups it
/// as colon-separated octets. Anything else is returned as received.
pub fn normalize_mac(mac: &str) -> String {
    let compact = mac
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect::<String>()
        .to_lowercase();

    if compact.len() == 12 && compact.chars().all(|c| c.is_ascii_hexdigit()) {
        compact
            .as_bytes()
            .chunks(2)
            .filter_map(|pair| std::str::from_utf8(pair).ok())
            .collect::<Vec<_>>()
            .join(":")
    } else {
        mac.to_string()
    }
}

fn date_from_epoch_millis(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|at| at.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_fields_are_flattened() {
        let device = extract_directory_device(&json!({
            "deviceId": "dev-1",
            "serialNumber": "abc123",
            "status": "ACTIVE",
            "annotatedUser": "Student@X.org",
            "macAddress": "A0B1C2D3E4F5",
            "lastKnownNetwork": [{"ipAddress": "10.0.0.4", "wanIpAddress": "203.0.113.9"}],
            "autoUpdateExpiration": "1780272000000",
            "recentUsers": [{"email": "student@x.org", "type": "USER_TYPE_MANAGED"}, {"type": "USER_TYPE_UNMANAGED"}]
        }))
        .expect("extract")
        .expect("device");

        assert_eq!(device.status, DeviceLifecycle::Active);
        assert_eq!(device.annotated_user.as_deref(), Some("student@x.org"));
        assert_eq!(device.mac_address.as_deref(), Some("a0:b1:c2:d3:e4:f5"));
        assert_eq!(device.ip_address.as_deref(), Some("10.0.0.4"));
        assert_eq!(device.wan_ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(device.auto_update_expiration.as_deref(), Some("2026-06-01"));
        assert_eq!(device.recent_users, vec!["student@x.org".to_string()]);
    }

    #[test]
    fn auto_update_through_takes_precedence() {
        let device = extract_directory_device(&json!({
            "deviceId": "dev-2",
            "autoUpdateThrough": "2029-06-30T00:00:00Z",
            "autoUpdateExpiration": "1780272000000"
        }))
        .expect("extract")
        .expect("device");
        assert_eq!(device.auto_update_expiration.as_deref(), Some("2029-06-30"));
        assert_eq!(device.status, DeviceLifecycle::Other);
    }

    #[test]
    fn device_without_id_is_keyless() {
        assert!(extract_directory_device(&json!({"serialNumber": "X"}))
            .expect("extract")
            .is_none());
    }

    #[test]
    fn odd_macs_pass_through() {
        assert_eq!(normalize_mac("a0:b1:c2:d3:e4:f5"), "a0:b1:c2:d3:e4:f5");
        assert_eq!(normalize_mac("A0-B1-C2-D3-E4-F5"), "a0:b1:c2:d3:e4:f5");
        assert_eq!(normalize_mac("unknown"), "unknown");
    }

    #[test]
    fn person_reads_student_schema() {
        let person = extract_directory_person(&json!({
            "id": "g-1",
            "primaryEmail": "a@x.org",
            "name": {"fullName": "Ann Lee", "givenName": "Ann", "familyName": "Lee"},
            "suspended": true,
            "customSchemas": {"Student_Data": {"Student_ID": 1234, "Grade": "10"}}
        }))
        .expect("extract")
        .expect("person");

        assert_eq!(person.full_name.as_deref(), Some("Ann Lee"));
        assert!(person.is_suspended);
        assert!(!person.is_admin);
        assert_eq!(person.student_id.as_deref(), Some("1234"));
        assert_eq!(person.student_grade.as_deref(), Some("10"));
    }
}
