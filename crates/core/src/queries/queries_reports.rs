//! Aggregate device reports computed over the merged device table.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::constants::GHOST_DEVICE_DAYS;
use crate::devices::{DeviceLifecycle, DeviceRecord};

use super::{
    AueBucket, AueModelCount, AueStatusReport, AueYearReport, BatteryHealthReport, DeviceSummary,
    GhostDevice, GhostDeviceReport, OrgUnitCount, StatusCount,
};

const TOP_ORG_UNITS: usize = 5;

fn parse_last_sync(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|at| at.and_utc())
        })
}

fn parse_aue(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Days since an active device last checked in, when it is past the ghost cutoff.
/// Devices with no or unparseable check-in times are never ghosts.
fn ghost_age(device: &DeviceRecord, now: DateTime<Utc>) -> Option<i64> {
    if device.status != DeviceLifecycle::Active {
        return None;
    }
    let last_sync = parse_last_sync(device.last_sync.as_deref()?)?;
    let days = (now - last_sync).num_days();
    (days >= GHOST_DEVICE_DAYS).then_some(days)
}

fn is_poor_battery(device: &DeviceRecord, threshold: i32) -> bool {
    device.status == DeviceLifecycle::Active
        && device
            .battery
            .health_percent
            .is_some_and(|health| health <= threshold)
}

pub(crate) fn summarize(
    devices: &[DeviceRecord],
    poor_battery_percent: i32,
    now: DateTime<Utc>,
) -> DeviceSummary {
    let mut by_status: HashMap<DeviceLifecycle, usize> = HashMap::new();
    let mut by_org_unit: HashMap<&str, usize> = HashMap::new();
    for device in devices {
        *by_status.entry(device.status).or_default() += 1;
        if let Some(org_unit) = device.org_unit_path.as_deref() {
            *by_org_unit.entry(org_unit).or_default() += 1;
        }
    }

    let mut status_breakdown: Vec<StatusCount> = by_status
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();
    status_breakdown.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.status.as_str().cmp(b.status.as_str()))
    });

    let mut top_org_units: Vec<OrgUnitCount> = by_org_unit
        .into_iter()
        .map(|(org_unit, count)| OrgUnitCount {
            org_unit: org_unit.to_string(),
            count,
        })
        .collect();
    top_org_units.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.org_unit.cmp(&b.org_unit)));
    top_org_units.truncate(TOP_ORG_UNITS);

    DeviceSummary {
        total_devices: devices.len(),
        total_active: devices
            .iter()
            .filter(|d| d.status == DeviceLifecycle::Active)
            .count(),
        ghost_count: devices.iter().filter(|d| ghost_age(d, now).is_some()).count(),
        poor_battery_count: devices
            .iter()
            .filter(|d| is_poor_battery(d, poor_battery_percent))
            .count(),
        status_breakdown,
        top_org_units,
    }
}

pub(crate) fn battery_health(devices: &[DeviceRecord], threshold: i32) -> BatteryHealthReport {
    let mut poor: Vec<DeviceRecord> = devices
        .iter()
        .filter(|d| is_poor_battery(d, threshold))
        .cloned()
        .collect();
    poor.sort_by(|a, b| {
        a.battery
            .health_percent
            .cmp(&b.battery.health_percent)
            .then_with(|| a.device_id.cmp(&b.device_id))
    });
    BatteryHealthReport {
        threshold,
        devices: poor,
    }
}

pub(crate) fn aue_status(devices: &[DeviceRecord], today: NaiveDate) -> AueStatusReport {
    let mut groups: HashMap<(&str, Option<&str>), usize> = HashMap::new();
    for device in devices {
        if let Some(model) = device.model.as_deref() {
            *groups
                .entry((model, device.auto_update_expiration.as_deref()))
                .or_default() += 1;
        }
    }

    let mut report = AueStatusReport::default();
    for ((model, aue), count) in groups {
        let entry = AueModelCount {
            model: model.to_string(),
            aue_month: aue.map(|date| date.get(..7).unwrap_or(date).to_string()),
            count,
        };
        let bucket = match aue.and_then(parse_aue) {
            Some(date) if date < today => &mut report.expired,
            Some(_) => &mut report.active,
            None => &mut report.unknown,
        };
        bucket.total_devices += count;
        bucket.models.push(entry);
    }
    for bucket in [&mut report.active, &mut report.expired, &mut report.unknown] {
        sort_models(bucket);
    }
    report
}

fn sort_models(bucket: &mut AueBucket) {
    bucket.models.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.model.cmp(&b.model))
            .then_with(|| a.aue_month.cmp(&b.aue_month))
    });
}

pub(crate) fn aue_year(devices: &[DeviceRecord], year: i32, today: NaiveDate) -> AueYearReport {
    let prefix = format!("{:04}-", year);
    let mut matching: Vec<DeviceRecord> = devices
        .iter()
        .filter(|d| {
            d.auto_update_expiration
                .as_deref()
                .is_some_and(|aue| aue.trim().starts_with(&prefix))
        })
        .cloned()
        .collect();
    matching.sort_by(|a, b| {
        a.auto_update_expiration
            .cmp(&b.auto_update_expiration)
            .then_with(|| a.model.cmp(&b.model))
            .then_with(|| a.device_id.cmp(&b.device_id))
    });
    AueYearReport {
        year,
        is_expired: year < today.year(),
        devices: matching,
    }
}

pub(crate) fn ghost_devices(devices: &[DeviceRecord], now: DateTime<Utc>) -> GhostDeviceReport {
    let mut ghosts: Vec<GhostDevice> = devices
        .iter()
        .filter_map(|device| {
            ghost_age(device, now).map(|days_since_sync| GhostDevice {
                device: device.clone(),
                days_since_sync,
            })
        })
        .collect();
    ghosts.sort_by(|a, b| {
        b.days_since_sync
            .cmp(&a.days_since_sync)
            .then_with(|| a.device.device_id.cmp(&b.device.device_id))
    });
    GhostDeviceReport {
        cutoff_days: GHOST_DEVICE_DAYS,
        devices: ghosts,
    }
}
