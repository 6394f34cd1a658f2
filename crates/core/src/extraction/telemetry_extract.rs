use crate::devices::BatteryTelemetry;
use crate::errors::Result;
use crate::upstream::{RawRecord, TelemetryDeviceRaw};

use super::decode_raw;

/// Battery telemetry for one directory device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatterySample {
    pub device_id: String,
    pub serial_number: Option<String>,
    pub battery: BatteryTelemetry,
}

/// Maps the telemetry health enum onto an approximate health percentage.
pub fn battery_health_percent(health: &str) -> Option<i32> {
    match health {
        "BATTERY_HEALTH_NORMAL" => Some(80),
        "BATTERY_REPLACE_SOON" => Some(40),
        "BATTERY_REPLACE_NOW" => Some(20),
        _ => None,
    }
}

/// Normalizes one telemetry device into a battery sample.
///
/// Returns `None` when the device has no identity or reported no battery data
/// at all, so that an empty sample never replaces a previous one.
pub fn extract_battery_sample(record: &RawRecord) -> Result<Option<BatterySample>> {
    let raw: TelemetryDeviceRaw = decode_raw(record)?;
    let Some(device_id) = raw.device_id else {
        return Ok(None);
    };

    let report = raw
        .battery_status_report
        .and_then(|reports| reports.into_iter().next());
    let info = raw.battery_info.and_then(|infos| infos.into_iter().next());
    if report.is_none() && info.is_none() {
        return Ok(None);
    }

    let report = report.unwrap_or_default();
    let info = info.unwrap_or_default();

    Ok(Some(BatterySample {
        device_id,
        serial_number: raw.serial_number,
        battery: BatteryTelemetry {
            health_percent: report.battery_health.as_deref().and_then(battery_health_percent),
            cycle_count: report.cycle_count.and_then(|v| i32::try_from(v).ok()),
            full_charge_capacity: report
                .full_charge_capacity
                .and_then(|v| i32::try_from(v).ok()),
            design_capacity: info.design_capacity.and_then(|v| i32::try_from(v).ok()),
            manufacturer: info.manufacturer,
            report_time: report.report_time,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_report_and_info_make_the_sample() {
        let sample = extract_battery_sample(&json!({
            "name": "customers/c/telemetry/devices/t1",
            "deviceId": "dev-1",
            "serialNumber": "ABC123",
            "batteryStatusReport": [
                {"reportTime": "2026-03-01T10:00:00Z", "batteryHealth": "BATTERY_REPLACE_SOON", "fullChargeCapacity": "3900", "cycleCount": 412},
                {"reportTime": "2026-02-01T10:00:00Z", "batteryHealth": "BATTERY_HEALTH_NORMAL"}
            ],
            "batteryInfo": [{"manufacturer": "SMP", "designCapacity": "4800"}]
        }))
        .expect("extract")
        .expect("sample");

        assert_eq!(sample.device_id, "dev-1");
        assert_eq!(
            sample.battery,
            BatteryTelemetry {
                health_percent: Some(40),
                cycle_count: Some(412),
                full_charge_capacity: Some(3900),
                design_capacity: Some(4800),
                manufacturer: Some("SMP".to_string()),
                report_time: Some("2026-03-01T10:00:00Z".to_string()),
            }
        );
    }

    #[test]
    fn device_without_battery_data_yields_nothing() {
        let sample = extract_battery_sample(&json!({"deviceId": "dev-2", "batteryStatusReport": []}))
            .expect("extract");
        assert!(sample.is_none());
    }

    #[test]
    fn unknown_health_maps_to_none() {
        assert_eq!(battery_health_percent("BATTERY_HEALTH_UNSPECIFIED"), None);
        assert_eq!(battery_health_percent("BATTERY_REPLACE_NOW"), Some(20));
    }
}
