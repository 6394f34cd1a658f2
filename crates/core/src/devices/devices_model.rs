//! Device domain models.

use serde::{Deserialize, Serialize};

use crate::upsert::Upsertable;

/// Lifecycle status reported by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceLifecycle {
    Active,
    Provisioned,
    Deprovisioned,
    Disabled,
    #[default]
    Other,
}

impl DeviceLifecycle {
    /// Maps a directory status string onto the lifecycle enum, case-insensitively.
    pub fn from_directory(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Self::Active,
            "PROVISIONED" => Self::Provisioned,
            "DEPROVISIONED" => Self::Deprovisioned,
            "DISABLED" => Self::Disabled,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Provisioned => "PROVISIONED",
            Self::Deprovisioned => "DEPROVISIONED",
            Self::Disabled => "DISABLED",
            Self::Other => "OTHER",
        }
    }
}

/// Battery telemetry sample. Always replaced as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryTelemetry {
    pub health_percent: Option<i32>,
    pub cycle_count: Option<i32>,
    pub full_charge_capacity: Option<i32>,
    pub design_capacity: Option<i32>,
    pub manufacturer: Option<String>,
    pub report_time: Option<String>,
}

/// Fields owned by the asset-tracking system.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingFields {
    pub asset_id: Option<String>,
    pub asset_tag: Option<String>,
    pub location: Option<String>,
    pub room: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
}

/// Last wireless sighting reported by the location service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFields {
    pub last_seen: Option<String>,
    pub ap_name: Option<String>,
    pub network_name: Option<String>,
}

/// Directory-reported device attributes after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryDevice {
    pub device_id: String,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub status: DeviceLifecycle,
    pub annotated_user: Option<String>,
    pub annotated_location: Option<String>,
    pub annotated_asset_id: Option<String>,
    pub org_unit_path: Option<String>,
    pub mac_address: Option<String>,
    pub ethernet_mac: Option<String>,
    pub ip_address: Option<String>,
    pub wan_ip_address: Option<String>,
    pub os_version: Option<String>,
    pub platform_version: Option<String>,
    pub firmware_version: Option<String>,
    pub boot_mode: Option<String>,
    pub auto_update_expiration: Option<String>,
    pub last_sync: Option<String>,
    pub recent_users: Vec<String>,
}

/// Where a device row's tracking data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceDataSource {
    #[default]
    Directory,
    Merged,
}

/// One physical device, merged across every source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub device_id: String,
    pub serial_number: Option<String>,
    pub asset_tag: Option<String>,
    pub model: Option<String>,
    pub status: DeviceLifecycle,
    pub annotated_user: Option<String>,
    pub annotated_location: Option<String>,
    pub annotated_asset_id: Option<String>,
    pub org_unit_path: Option<String>,
    pub mac_address: Option<String>,
    pub ethernet_mac: Option<String>,
    pub ip_address: Option<String>,
    pub wan_ip_address: Option<String>,
    pub os_version: Option<String>,
    pub platform_version: Option<String>,
    pub firmware_version: Option<String>,
    pub boot_mode: Option<String>,
    pub auto_update_expiration: Option<String>,
    pub last_sync: Option<String>,
    pub recent_users: Vec<String>,
    pub battery: BatteryTelemetry,
    pub tracking: TrackingFields,
    pub location: LocationFields,
    pub data_source: DeviceDataSource,
    /// When a directory page last delivered this device.
    pub directory_synced_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Upsertable for DeviceRecord {
    fn upsert_key(&self) -> String {
        self.device_id.clone()
    }

    fn same_content(&self, other: &Self) -> bool {
        let strip = |record: &Self| Self {
            directory_synced_at: None,
            created_at: None,
            updated_at: None,
            ..record.clone()
        };
        strip(self) == strip(other)
    }
}

/// Filters for device listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFilter {
    pub status: Option<DeviceLifecycle>,
    pub org_unit_prefix: Option<String>,
    pub tracking_status: Option<String>,
    pub limit: i64,
    pub offset: i64,
}
