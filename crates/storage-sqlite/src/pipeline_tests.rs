//! Full runs against a real database: a second pass over unchanged upstream
//! data creates nothing and leaves row content alone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use fleetsync_core::constants::FULL_RUN_LOCK_NAME;
use fleetsync_core::devices::{DeviceDataSource, DeviceFilter, DeviceRepositoryTrait};
use fleetsync_core::people::{
    PersonDataSource, PersonFilter, PersonRecord, PersonRepositoryTrait,
};
use fleetsync_core::resources::{MemoryGuard, MemoryGuardConfig, MemorySampler};
use fleetsync_core::runs::{RunCategory, RunLockRepositoryTrait, RunLogRepositoryTrait, RunStatus};
use fleetsync_core::sync::{
    Pipeline, PipelineConfig, ProgressLog, RunService, RunServiceTrait, SyncSources, SyncStores,
};
use fleetsync_core::upsert::Upsertable;
use fleetsync_core::upstream::{
    AssetServiceProvider, DirectoryProvider, FeeBalance, LocationProvider, PageStream, RawRecord,
};
use fleetsync_core::Result;

use crate::test_support::setup_db;
use crate::{AssetRepository, DeviceRepository, PersonRepository, RunLockRepository, RunLogRepository};

fn one_page(records: Vec<RawRecord>) -> PageStream<'static> {
    stream::iter(vec![Ok(records)]).boxed()
}

struct StaticDirectory {
    devices: Vec<RawRecord>,
    users: Vec<RawRecord>,
}

#[async_trait]
impl DirectoryProvider for StaticDirectory {
    fn list_devices(&self, _query: Option<String>, _max_results: usize) -> PageStream<'_> {
        one_page(self.devices.clone())
    }

    fn list_users(&self, _max_results: usize) -> PageStream<'_> {
        one_page(self.users.clone())
    }

    async fn get_user(&self, email: &str) -> Result<Option<RawRecord>> {
        Ok(self
            .users
            .iter()
            .find(|user| user["primaryEmail"].as_str() == Some(email))
            .cloned())
    }
}

struct StaticAssetService {
    assets: Vec<RawRecord>,
    users: Vec<RawRecord>,
    fees: Mutex<HashMap<String, Decimal>>,
}

#[async_trait]
impl AssetServiceProvider for StaticAssetService {
    fn search_assets(&self, _query: String, _limit: usize) -> PageStream<'_> {
        one_page(self.assets.clone())
    }

    async fn get_asset_by_tag(&self, asset_tag: &str) -> Result<Option<RawRecord>> {
        Ok(self
            .assets
            .iter()
            .find(|asset| asset["AssetTag"].as_str() == Some(asset_tag))
            .cloned())
    }

    async fn get_users(&self, page: usize, page_size: usize) -> Result<Vec<RawRecord>> {
        Ok(self
            .users
            .iter()
            .skip(page * page_size)
            .take(page_size)
            .cloned()
            .collect())
    }

    async fn get_user_fees(&self, user_id: &str) -> Result<FeeBalance> {
        Ok(FeeBalance {
            total_balance: self.fees.lock().unwrap().get(user_id).copied(),
            fees: Vec::new(),
            endpoint_found: true,
        })
    }
}

struct StaticLocation;

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn get_device_by_mac(&self, _mac_address: &str) -> Result<Option<RawRecord>> {
        Ok(Some(json!({ "lastSeen": 1780272000, "apName": "LHS-AP-201", "networkName": "LHS" })))
    }
}

struct Idle;

impl MemorySampler for Idle {
    fn used_percent(&self) -> f64 {
        10.0
    }
}

fn directory_device(id: &str, serial: &str, user: &str) -> Value {
    json!({
        "deviceId": id,
        "serialNumber": serial,
        "status": "ACTIVE",
        "model": "Chromebook 3100",
        "annotatedUser": user,
        "orgUnitPath": "/Students",
        "macAddress": "A0B1C2D3E4F5",
        "recentUsers": [{ "email": user, "type": "USER_TYPE_MANAGED" }]
    })
}

struct Fixture {
    service: Arc<RunService>,
    devices: Arc<DeviceRepository>,
    people: Arc<PersonRepository>,
    run_log: Arc<RunLogRepository>,
    run_lock: Arc<RunLockRepository>,
}

fn fixture() -> Fixture {
    let (pool, writer) = setup_db();
    let devices = Arc::new(DeviceRepository::new(pool.clone(), writer.clone()));
    let assets = Arc::new(AssetRepository::new(pool.clone(), writer.clone()));
    let people = Arc::new(PersonRepository::new(pool.clone(), writer.clone()));
    let run_log = Arc::new(RunLogRepository::new(pool.clone(), writer.clone()));
    let run_lock = Arc::new(RunLockRepository::new(pool, writer));

    let directory = StaticDirectory {
        devices: vec![
            directory_device("d-1", "abc123", "ada@x.org"),
            directory_device("d-2", "ZZZ999", "grace@x.org"),
        ],
        users: vec![json!({
            "id": "g-1",
            "primaryEmail": "ada@x.org",
            "name": { "fullName": "Ada Lovelace", "givenName": "Ada", "familyName": "Lovelace" },
            "orgUnitPath": "/Students"
        })],
    };
    let asset_service = StaticAssetService {
        assets: vec![json!({
            "AssetId": "a-1",
            "AssetTag": "T-100",
            "SerialNumber": "ABC123",
            "Model": { "Name": "Chromebook 3100", "Category": { "Name": "Chromebooks" } },
            "Location": { "Name": "Lincoln High" },
            "RoomName": "Room 5",
            "Status": { "Name": "In Service" }
        })],
        users: vec![
            json!({ "UserId": "u-1", "Email": "ADA@x.org", "Name": "Ada Lovelace", "Grade": "10", "IsActive": true }),
            json!({ "UserId": "u-2", "Email": "linus@x.org", "Name": "Linus T", "Grade": "11", "IsActive": true }),
        ],
        fees: Mutex::new(HashMap::from([("u-1".to_string(), dec!(42.50))])),
    };

    let config = PipelineConfig {
        batch_size: 1,
        page_workers: 2,
        fee_workers: 2,
        tracking_user_page_size: 1,
        ..Default::default()
    };
    let progress = Arc::new(ProgressLog::default());
    let sources = SyncSources {
        directory: Arc::new(directory),
        telemetry: None,
        asset_service: Arc::new(asset_service),
        location: Some(Arc::new(StaticLocation)),
    };
    let stores = SyncStores {
        devices: devices.clone(),
        assets,
        people: people.clone(),
        run_log: run_log.clone(),
        run_lock: run_lock.clone(),
    };
    let pipeline = Pipeline::new(sources, stores, config, progress.clone()).with_memory_guard(
        Arc::new(MemoryGuard::new(MemoryGuardConfig::default(), Arc::new(Idle))),
    );

    Fixture {
        service: Arc::new(RunService::new(Arc::new(pipeline), progress)),
        devices,
        people,
        run_log,
        run_lock,
    }
}

#[tokio::test]
async fn second_full_run_only_refreshes() {
    let fx = fixture();

    let first = fx.service.run_blocking(RunCategory::Full).await.expect("first run");
    assert_eq!(first.status, RunStatus::Completed);
    let details = first.details.expect("details");
    assert_eq!(details.assets.created, 1);
    assert_eq!(details.devices.created, 2);
    assert_eq!(details.people.created, 2);

    let merged = fx.devices.find_by_serial("ABC123").expect("lookup").expect("d-1");
    assert_eq!(merged.device_id, "d-1");
    assert_eq!(merged.data_source, DeviceDataSource::Merged);
    assert_eq!(merged.tracking.room.as_deref(), Some("Room 5"));
    assert_eq!(merged.location.ap_name.as_deref(), Some("LHS-AP-201"));

    let ada = fx.people.find_by_email("ada@x.org").expect("lookup").expect("ada");
    assert_eq!(ada.data_source, PersonDataSource::Merged);
    assert_eq!(ada.total_fee_balance, dec!(42.50));
    assert!(ada.has_outstanding_fees);
    assert_eq!(ada.assigned_devices, vec!["d-1".to_string()]);

    let devices_before = fx.devices.list(&DeviceFilter::default()).expect("devices");
    let people_before = fx.people.list(&PersonFilter::default()).expect("people");

    let second = fx.service.run_blocking(RunCategory::Full).await.expect("second run");
    let details = second.details.expect("details");
    assert_eq!(details.assets.created, 0);
    assert_eq!(details.devices.created, 0);
    assert_eq!(details.people.created, 0);
    assert_eq!(details.devices.unchanged, 2);

    let devices_after = fx.devices.list(&DeviceFilter::default()).expect("devices");
    let people_after = fx.people.list(&PersonFilter::default()).expect("people");
    assert_eq!(devices_before.len(), devices_after.len());
    assert_eq!(people_before.len(), people_after.len());
    for (before, after) in devices_before.iter().zip(&devices_after) {
        assert!(before.same_content(after), "device {} drifted", before.device_id);
    }
    // Fee lookups restamp fee_last_synced_at on every run.
    for (before, after) in people_before.iter().zip(&people_after) {
        let restamped = PersonRecord {
            fee_last_synced_at: before.fee_last_synced_at.clone(),
            ..after.clone()
        };
        assert!(before.same_content(&restamped), "person {} drifted", before.email);
    }

    let history = fx.run_log.recent_runs(5).expect("history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|run| run.status == RunStatus::Completed));
    assert!(fx.run_lock.current_holder(FULL_RUN_LOCK_NAME).expect("holder").is_none());
}
