//! Database models for merged devices.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use fleetsync_core::devices::{
    BatteryTelemetry, DeviceDataSource, DeviceLifecycle, DeviceRecord, LocationFields,
    TrackingFields,
};
use fleetsync_core::Result;

use crate::text_columns::{enum_from_db, enum_to_db, list_from_db, list_to_db};

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(primary_key(device_id))]
#[diesel(table_name = crate::schema::devices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DeviceDB {
    pub device_id: String,
    pub serial_number: Option<String>,
    pub asset_tag: Option<String>,
    pub model: Option<String>,
    pub status: String,
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
    pub recent_users: String,
    pub battery_health_percent: Option<i32>,
    pub battery_cycle_count: Option<i32>,
    pub battery_full_charge_capacity: Option<i32>,
    pub battery_design_capacity: Option<i32>,
    pub battery_manufacturer: Option<String>,
    pub battery_report_time: Option<String>,
    pub tracking_asset_id: Option<String>,
    pub tracking_asset_tag: Option<String>,
    pub tracking_location: Option<String>,
    pub tracking_room: Option<String>,
    pub tracking_notes: Option<String>,
    pub tracking_status: Option<String>,
    pub tracking_owner_name: Option<String>,
    pub tracking_owner_email: Option<String>,
    pub location_last_seen: Option<String>,
    pub location_ap_name: Option<String>,
    pub location_network_name: Option<String>,
    pub data_source: String,
    pub directory_synced_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Write-side row. Leaves `created_at`/`updated_at` to SQL defaults and the
/// update trigger. `None` clears a column.
#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::devices)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DeviceWriteDB {
    pub device_id: String,
    pub serial_number: Option<String>,
    pub asset_tag: Option<String>,
    pub model: Option<String>,
    pub status: String,
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
    pub recent_users: String,
    pub battery_health_percent: Option<i32>,
    pub battery_cycle_count: Option<i32>,
    pub battery_full_charge_capacity: Option<i32>,
    pub battery_design_capacity: Option<i32>,
    pub battery_manufacturer: Option<String>,
    pub battery_report_time: Option<String>,
    pub tracking_asset_id: Option<String>,
    pub tracking_asset_tag: Option<String>,
    pub tracking_location: Option<String>,
    pub tracking_room: Option<String>,
    pub tracking_notes: Option<String>,
    pub tracking_status: Option<String>,
    pub tracking_owner_name: Option<String>,
    pub tracking_owner_email: Option<String>,
    pub location_last_seen: Option<String>,
    pub location_ap_name: Option<String>,
    pub location_network_name: Option<String>,
    pub data_source: String,
    pub directory_synced_at: Option<String>,
}

impl From<DeviceDB> for DeviceRecord {
    fn from(db: DeviceDB) -> Self {
        Self {
            device_id: db.device_id,
            serial_number: db.serial_number,
            asset_tag: db.asset_tag,
            model: db.model,
            status: enum_from_db::<DeviceLifecycle>(&db.status).unwrap_or_default(),
            annotated_user: db.annotated_user,
            annotated_location: db.annotated_location,
            annotated_asset_id: db.annotated_asset_id,
            org_unit_path: db.org_unit_path,
            mac_address: db.mac_address,
            ethernet_mac: db.ethernet_mac,
            ip_address: db.ip_address,
            wan_ip_address: db.wan_ip_address,
            os_version: db.os_version,
            platform_version: db.platform_version,
            firmware_version: db.firmware_version,
            boot_mode: db.boot_mode,
            auto_update_expiration: db.auto_update_expiration,
            last_sync: db.last_sync,
            recent_users: list_from_db(&db.recent_users),
            battery: BatteryTelemetry {
                health_percent: db.battery_health_percent,
                cycle_count: db.battery_cycle_count,
                full_charge_capacity: db.battery_full_charge_capacity,
                design_capacity: db.battery_design_capacity,
                manufacturer: db.battery_manufacturer,
                report_time: db.battery_report_time,
            },
            tracking: TrackingFields {
                asset_id: db.tracking_asset_id,
                asset_tag: db.tracking_asset_tag,
                location: db.tracking_location,
                room: db.tracking_room,
                notes: db.tracking_notes,
                status: db.tracking_status,
                owner_name: db.tracking_owner_name,
                owner_email: db.tracking_owner_email,
            },
            location: LocationFields {
                last_seen: db.location_last_seen,
                ap_name: db.location_ap_name,
                network_name: db.location_network_name,
            },
            data_source: enum_from_db::<DeviceDataSource>(&db.data_source).unwrap_or_default(),
            directory_synced_at: db.directory_synced_at,
            created_at: Some(db.created_at),
            updated_at: Some(db.updated_at),
        }
    }
}

impl DeviceWriteDB {
    pub fn from_record(record: DeviceRecord) -> Result<Self> {
        Ok(Self {
            status: enum_to_db(&record.status)?,
            recent_users: list_to_db(&record.recent_users)?,
            data_source: enum_to_db(&record.data_source)?,
            device_id: record.device_id,
            serial_number: record.serial_number,
            asset_tag: record.asset_tag,
            model: record.model,
            annotated_user: record.annotated_user,
            annotated_location: record.annotated_location,
            annotated_asset_id: record.annotated_asset_id,
            org_unit_path: record.org_unit_path,
            mac_address: record.mac_address,
            ethernet_mac: record.ethernet_mac,
            ip_address: record.ip_address,
            wan_ip_address: record.wan_ip_address,
            os_version: record.os_version,
            platform_version: record.platform_version,
            firmware_version: record.firmware_version,
            boot_mode: record.boot_mode,
            auto_update_expiration: record.auto_update_expiration,
            last_sync: record.last_sync,
            battery_health_percent: record.battery.health_percent,
            battery_cycle_count: record.battery.cycle_count,
            battery_full_charge_capacity: record.battery.full_charge_capacity,
            battery_design_capacity: record.battery.design_capacity,
            battery_manufacturer: record.battery.manufacturer,
            battery_report_time: record.battery.report_time,
            tracking_asset_id: record.tracking.asset_id,
            tracking_asset_tag: record.tracking.asset_tag,
            tracking_location: record.tracking.location,
            tracking_room: record.tracking.room,
            tracking_notes: record.tracking.notes,
            tracking_status: record.tracking.status,
            tracking_owner_name: record.tracking.owner_name,
            tracking_owner_email: record.tracking.owner_email,
            location_last_seen: record.location.last_seen,
            location_ap_name: record.location.ap_name,
            location_network_name: record.location.network_name,
            directory_synced_at: record.directory_synced_at,
        })
    }
}
