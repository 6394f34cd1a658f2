use serde::{Deserialize, Serialize};

use crate::devices::{DeviceLifecycle, DeviceRecord};
use crate::people::PersonRecord;

/// A person together with the devices currently annotated to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetail {
    pub person: PersonRecord,
    pub devices: Vec<DeviceRecord>,
}

/// Device count for one lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: DeviceLifecycle,
    pub count: usize,
}

/// Device count for one organizational unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnitCount {
    pub org_unit: String,
    pub count: usize,
}

/// Dashboard counts over the whole fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub total_devices: usize,
    pub total_active: usize,
    pub ghost_count: usize,
    pub poor_battery_count: usize,
    pub status_breakdown: Vec<StatusCount>,
    pub top_org_units: Vec<OrgUnitCount>,
}

/// Active devices whose battery health is at or below `threshold`, worst first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryHealthReport {
    pub threshold: i32,
    pub devices: Vec<DeviceRecord>,
}

/// Devices of one model sharing one auto-update expiration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AueModelCount {
    pub model: String,
    /// `YYYY-MM`, or `None` when the directory reports no date.
    pub aue_month: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AueBucket {
    pub models: Vec<AueModelCount>,
    pub total_devices: usize,
}

/// Models split by whether their auto-update expiration has passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AueStatusReport {
    pub active: AueBucket,
    pub expired: AueBucket,
    pub unknown: AueBucket,
}

/// Devices whose auto-update expiration falls in `year`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AueYearReport {
    pub year: i32,
    pub is_expired: bool,
    pub devices: Vec<DeviceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostDevice {
    pub device: DeviceRecord,
    pub days_since_sync: i64,
}

/// Active devices that stopped checking in with the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostDeviceReport {
    pub cutoff_days: i64,
    pub devices: Vec<GhostDevice>,
}
