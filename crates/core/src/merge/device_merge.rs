use crate::devices::{
    BatteryTelemetry, DeviceDataSource, DeviceRecord, DirectoryDevice, LocationFields, TrackingFields,
};
use crate::identity::device_join_key;

/// This run's source records for one device.
#[derive(Debug, Clone, Default)]
pub struct DeviceSources {
    pub directory: DirectoryDevice,
    /// Tracking record matched by serial this run, from the in-run index or
    /// the stored asset table.
    pub tracking: Option<TrackingFields>,
    pub battery: Option<BatteryTelemetry>,
    pub location: Option<LocationFields>,
}

/// Merges one device.
///
/// Directory attributes always overwrite. Tracking, battery and location
/// groups are replaced whole when this run supplied them and otherwise keep
/// their stored values.
pub fn merge_device(existing: Option<&DeviceRecord>, sources: DeviceSources, synced_at: &str) -> DeviceRecord {
    let DeviceSources {
        directory,
        tracking,
        battery,
        location,
    } = sources;

    let matched_tracking = tracking.is_some();
    let tracking = tracking
        .or_else(|| existing.map(|row| row.tracking.clone()))
        .unwrap_or_default();
    let battery = battery
        .or_else(|| existing.map(|row| row.battery.clone()))
        .unwrap_or_default();
    let location = location
        .or_else(|| existing.map(|row| row.location.clone()))
        .unwrap_or_default();

    let asset_tag = directory
        .annotated_asset_id
        .clone()
        .or_else(|| tracking.asset_tag.clone())
        .or_else(|| existing.and_then(|row| row.asset_tag.clone()));

    let data_source = if matched_tracking
        || existing.is_some_and(|row| row.data_source == DeviceDataSource::Merged)
    {
        DeviceDataSource::Merged
    } else {
        DeviceDataSource::Directory
    };

    DeviceRecord {
        serial_number: device_join_key(directory.serial_number.as_deref()),
        device_id: directory.device_id,
        asset_tag,
        model: directory.model,
        status: directory.status,
        annotated_user: directory.annotated_user,
        annotated_location: directory.annotated_location,
        annotated_asset_id: directory.annotated_asset_id,
        org_unit_path: directory.org_unit_path,
        mac_address: directory.mac_address,
        ethernet_mac: directory.ethernet_mac,
        ip_address: directory.ip_address,
        wan_ip_address: directory.wan_ip_address,
        os_version: directory.os_version,
        platform_version: directory.platform_version,
        firmware_version: directory.firmware_version,
        boot_mode: directory.boot_mode,
        auto_update_expiration: directory.auto_update_expiration,
        last_sync: directory.last_sync,
        recent_users: directory.recent_users,
        battery,
        tracking,
        location,
        data_source,
        directory_synced_at: Some(synced_at.to_string()),
        created_at: existing.and_then(|row| row.created_at.clone()),
        updated_at: existing.and_then(|row| row.updated_at.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::DeviceLifecycle;

    fn directory(serial: &str, status: DeviceLifecycle) -> DirectoryDevice {
        DirectoryDevice {
            device_id: "dev-1".to_string(),
            serial_number: Some(serial.to_string()),
            status,
            model: Some("Chromebook 3100".to_string()),
            ..Default::default()
        }
    }

    fn tracking(status: &str, location: &str) -> TrackingFields {
        TrackingFields {
            asset_id: Some("a-1".to_string()),
            asset_tag: Some("T-100".to_string()),
            location: Some(location.to_string()),
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn directory_wins_and_missing_tracking_is_preserved() {
        let previous = merge_device(
            None,
            DeviceSources {
                directory: directory("xyz1", DeviceLifecycle::Disabled),
                tracking: Some(tracking("In Repair", "Room 5")),
                ..Default::default()
            },
            "2026-01-01T00:00:00Z",
        );

        let merged = merge_device(
            Some(&previous),
            DeviceSources {
                directory: directory("XYZ1", DeviceLifecycle::Active),
                ..Default::default()
            },
            "2026-01-02T00:00:00Z",
        );

        assert_eq!(merged.status, DeviceLifecycle::Active);
        assert_eq!(merged.serial_number.as_deref(), Some("XYZ1"));
        assert_eq!(merged.tracking.status.as_deref(), Some("In Repair"));
        assert_eq!(merged.tracking.location.as_deref(), Some("Room 5"));
        assert_eq!(merged.asset_tag.as_deref(), Some("T-100"));
        assert_eq!(merged.data_source, DeviceDataSource::Merged);
        assert_eq!(merged.directory_synced_at.as_deref(), Some("2026-01-02T00:00:00Z"));
    }

    #[test]
    fn battery_sample_replaces_all_fields() {
        let previous = DeviceRecord {
            device_id: "dev-1".to_string(),
            battery: BatteryTelemetry {
                health_percent: Some(80),
                cycle_count: Some(100),
                manufacturer: Some("SMP".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let sample = BatteryTelemetry {
            health_percent: Some(40),
            ..Default::default()
        };

        let merged = merge_device(
            Some(&previous),
            DeviceSources {
                directory: directory("XYZ1", DeviceLifecycle::Active),
                battery: Some(sample.clone()),
                ..Default::default()
            },
            "2026-01-02T00:00:00Z",
        );
        assert_eq!(merged.battery, sample);
    }

    #[test]
    fn annotated_asset_id_beats_tracking_tag() {
        let mut source = directory("XYZ1", DeviceLifecycle::Active);
        source.annotated_asset_id = Some("DIR-7".to_string());
        let merged = merge_device(
            None,
            DeviceSources {
                directory: source,
                tracking: Some(tracking("Deployed", "Library")),
                ..Default::default()
            },
            "2026-01-02T00:00:00Z",
        );
        assert_eq!(merged.asset_tag.as_deref(), Some("DIR-7"));
    }

    #[test]
    fn device_without_any_tracking_stays_directory_sourced() {
        let merged = merge_device(
            None,
            DeviceSources {
                directory: directory("", DeviceLifecycle::Provisioned),
                ..Default::default()
            },
            "2026-01-02T00:00:00Z",
        );
        assert_eq!(merged.serial_number, None);
        assert_eq!(merged.data_source, DeviceDataSource::Directory);
        assert_eq!(merged.tracking, TrackingFields::default());
    }
}
