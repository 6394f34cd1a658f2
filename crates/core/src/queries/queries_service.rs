use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheKeys, CacheStore};
use crate::constants::{
    DEFAULT_POOR_BATTERY_PERCENT, NOT_FOUND_CACHE_TTL_SECS, QUERY_CACHE_TTL_SECS,
    REPORT_CACHE_TTL_SECS,
};
use crate::devices::{DeviceFilter, DeviceRecord, DeviceRepositoryTrait};
use crate::errors::Result;
use crate::identity::{device_join_key, person_join_key};
use crate::people::{PersonFilter, PersonRecord, PersonRepositoryTrait};
use crate::runs::{RunLog, RunLogRepositoryTrait};

use super::queries_reports;
use super::{
    AueStatusReport, AueYearReport, BatteryHealthReport, DeviceSummary, GhostDeviceReport,
    PersonDetail,
};

#[async_trait]
pub trait QueryServiceTrait: Send + Sync {
    /// Finds a device by serial number, falling back to asset tag.
    async fn find_device(&self, identifier: &str) -> Result<Option<DeviceRecord>>;

    /// Finds a person by email together with their assigned devices.
    async fn find_person(&self, email: &str) -> Result<Option<PersonDetail>>;

    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>>;

    async fn list_people(&self, filter: &PersonFilter) -> Result<Vec<PersonRecord>>;

    /// Most recent runs first. Never cached.
    fn run_history(&self, limit: i64) -> Result<Vec<RunLog>>;

    /// Fleet counts; poor batteries use the default threshold.
    async fn device_summary(&self) -> Result<DeviceSummary>;

    /// Active devices with battery health at or below `threshold` percent.
    async fn battery_health_report(&self, threshold: i32) -> Result<BatteryHealthReport>;

    async fn aue_status_report(&self) -> Result<AueStatusReport>;

    async fn aue_year_report(&self, year: i32) -> Result<AueYearReport>;

    async fn ghost_device_report(&self) -> Result<GhostDeviceReport>;
}

/// Read-through cache in front of the repositories.
///
/// Cache failures never fail a query; they are logged and the store is read
/// directly.
pub struct QueryService {
    device_repository: Arc<dyn DeviceRepositoryTrait>,
    person_repository: Arc<dyn PersonRepositoryTrait>,
    run_log_repository: Arc<dyn RunLogRepositoryTrait>,
    cache: Arc<dyn CacheStore>,
}

impl QueryService {
    pub fn new(
        device_repository: Arc<dyn DeviceRepositoryTrait>,
        person_repository: Arc<dyn PersonRepositoryTrait>,
        run_log_repository: Arc<dyn RunLogRepositoryTrait>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            device_repository,
            person_repository,
            run_log_repository,
            cache,
        }
    }

    /// `Some(None)` is a cached "not found".
    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<Option<T>> {
        match self.cache.get(key).await {
            Ok(Some(serde_json::Value::Null)) => Some(None),
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => Some(Some(decoded)),
                Err(err) => {
                    warn!("[Cache] dropping undecodable entry {}: {}", key, err);
                    let _ = self.cache.delete(key).await;
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("[Cache] read of {} failed: {}", key, err);
                None
            }
        }
    }

    async fn remember<T: Serialize>(&self, key: &str, value: Option<&T>) {
        let (json, ttl) = match value {
            Some(found) => match serde_json::to_value(found) {
                Ok(json) => (json, QUERY_CACHE_TTL_SECS),
                Err(err) => {
                    warn!("[Cache] cannot serialize entry {}: {}", key, err);
                    return;
                }
            },
            None => (serde_json::Value::Null, NOT_FOUND_CACHE_TTL_SECS),
        };
        self.store(key, json, ttl).await;
    }

    async fn store(&self, key: &str, json: serde_json::Value, ttl: u64) {
        if let Err(err) = self.cache.set(key, json, Duration::from_secs(ttl)).await {
            warn!("[Cache] write of {} failed: {}", key, err);
        }
    }

    /// Point lookup cached under `key`, including a "not found" answer.
    async fn lookup<T, F>(&self, key: &str, load: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Result<Option<T>> + Send,
    {
        if let Some(hit) = self.cached::<T>(key).await {
            debug!("[Query] cache hit for {}", key);
            return Ok(hit);
        }
        let found = load()?;
        self.remember(key, found.as_ref()).await;
        Ok(found)
    }

    /// Report over every stored device, cached under `key`.
    async fn report<T, F>(&self, key: &str, build: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce(&[DeviceRecord]) -> T + Send,
    {
        if let Some(Some(hit)) = self.cached::<T>(key).await {
            debug!("[Query] cache hit for {}", key);
            return Ok(hit);
        }
        let devices = self.device_repository.list(&DeviceFilter::default())?;
        let report = build(&devices);
        match serde_json::to_value(&report) {
            Ok(json) => self.store(key, json, REPORT_CACHE_TTL_SECS).await,
            Err(err) => warn!("[Cache] cannot serialize report {}: {}", key, err),
        }
        Ok(report)
    }
}

#[async_trait]
impl QueryServiceTrait for QueryService {
    async fn find_device(&self, identifier: &str) -> Result<Option<DeviceRecord>> {
        let identifier = identifier.trim();
        let Some(serial) = device_join_key(Some(identifier)) else {
            return Ok(None);
        };

        // Serials are case-insensitive and tags are not, so each has its own key.
        let serial_key = CacheKeys::device_by_serial(&serial);
        let by_serial = self
            .lookup(&serial_key, || self.device_repository.find_by_serial(&serial))
            .await?;
        if by_serial.is_some() {
            return Ok(by_serial);
        }

        let tag_key = CacheKeys::device_by_tag(identifier);
        self.lookup(&tag_key, || self.device_repository.find_by_asset_tag(identifier))
            .await
    }

    async fn find_person(&self, email: &str) -> Result<Option<PersonDetail>> {
        let Some(email) = person_join_key(Some(email)) else {
            return Ok(None);
        };

        let key = CacheKeys::person_by_email(&email);
        self.lookup(&key, || {
            Ok(match self.person_repository.find_by_email(&email)? {
                Some(person) => Some(PersonDetail {
                    devices: self.device_repository.list_for_user(&email)?,
                    person,
                }),
                None => None,
            })
        })
        .await
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>> {
        let key = CacheKeys::device_list(&serde_json::to_string(filter)?);
        if let Some(Some(hit)) = self.cached::<Vec<DeviceRecord>>(&key).await {
            return Ok(hit);
        }
        let devices = self.device_repository.list(filter)?;
        self.remember(&key, Some(&devices)).await;
        Ok(devices)
    }

    async fn list_people(&self, filter: &PersonFilter) -> Result<Vec<PersonRecord>> {
        let key = CacheKeys::person_list(&serde_json::to_string(filter)?);
        if let Some(Some(hit)) = self.cached::<Vec<PersonRecord>>(&key).await {
            return Ok(hit);
        }
        let people = self.person_repository.list(filter)?;
        self.remember(&key, Some(&people)).await;
        Ok(people)
    }

    fn run_history(&self, limit: i64) -> Result<Vec<RunLog>> {
        self.run_log_repository.recent_runs(limit.max(1))
    }

    async fn device_summary(&self) -> Result<DeviceSummary> {
        let now = Utc::now();
        self.report(CacheKeys::REPORT_SUMMARY, |devices| {
            queries_reports::summarize(devices, DEFAULT_POOR_BATTERY_PERCENT, now)
        })
        .await
    }

    async fn battery_health_report(&self, threshold: i32) -> Result<BatteryHealthReport> {
        self.report(&CacheKeys::report_battery_health(threshold), |devices| {
            queries_reports::battery_health(devices, threshold)
        })
        .await
    }

    async fn aue_status_report(&self) -> Result<AueStatusReport> {
        let today = Utc::now().date_naive();
        self.report(CacheKeys::REPORT_AUE_STATUS, |devices| {
            queries_reports::aue_status(devices, today)
        })
        .await
    }

    async fn aue_year_report(&self, year: i32) -> Result<AueYearReport> {
        let today = Utc::now().date_naive();
        self.report(&CacheKeys::report_aue_year(year), |devices| {
            queries_reports::aue_year(devices, year, today)
        })
        .await
    }

    async fn ghost_device_report(&self) -> Result<GhostDeviceReport> {
        let now = Utc::now();
        self.report(CacheKeys::REPORT_GHOST_DEVICES, |devices| {
            queries_reports::ghost_devices(devices, now)
        })
        .await
    }
}
