//! In-memory repositories and scripted providers for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;

use crate::assets::{AssetRecord, AssetRepositoryTrait};
use crate::devices::{DeviceFilter, DeviceRecord, DeviceRepositoryTrait};
use crate::errors::{DatabaseError, Error, Result, UpstreamSystem};
use crate::people::{FeeCandidate, FeeUpdate, PersonFilter, PersonRecord, PersonRepositoryTrait};
use crate::resources::MemorySampler;
use crate::runs::{
    RunCategory, RunCompletion, RunLockRepositoryTrait, RunLog, RunLogRepositoryTrait, RunStatus,
};
use crate::upsert::{UpsertBatch, UpsertStore, Upsertable};
use crate::upstream::{
    AssetServiceProvider, DirectoryProvider, FeeBalance, LocationProvider, PageStream, RawRecord,
    TelemetryProvider,
};

// ── Stores ───────────────────────────────────────────────────────────────────

pub struct InMemoryTable<E> {
    rows: Mutex<BTreeMap<String, E>>,
    commits: Mutex<usize>,
    fail_on_commit: Mutex<Option<usize>>,
}

impl<E: Upsertable> Default for InMemoryTable<E> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            commits: Mutex::new(0),
            fail_on_commit: Mutex::new(None),
        }
    }
}

impl<E: Upsertable> InMemoryTable<E> {
    pub fn with_rows(rows: Vec<E>) -> Self {
        let table = Self::default();
        {
            let mut stored = table.rows.lock().unwrap();
            for row in rows {
                stored.insert(row.upsert_key(), row);
            }
        }
        table
    }

    pub fn get(&self, key: &str) -> Option<E> {
        self.rows.lock().unwrap().get(key).cloned()
    }

    pub fn rows(&self) -> Vec<E> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Makes the n-th commit from now (1-based) fail.
    pub fn fail_on_commit(&self, nth: usize) {
        let done = *self.commits.lock().unwrap();
        *self.fail_on_commit.lock().unwrap() = Some(done + nth);
    }
}

#[async_trait]
impl<E: Upsertable> UpsertStore<E> for InMemoryTable<E> {
    fn load_existing(&self, keys: &[String]) -> Result<HashMap<String, E>> {
        let rows = self.rows.lock().unwrap();
        Ok(keys
            .iter()
            .filter_map(|key| rows.get(key).map(|row| (key.clone(), row.clone())))
            .collect())
    }

    async fn commit_batch(&self, batch: UpsertBatch<E>) -> Result<()> {
        let mut commits = self.commits.lock().unwrap();
        *commits += 1;
        if Some(*commits) == *self.fail_on_commit.lock().unwrap() {
            return Err(Error::Database(DatabaseError::ConnectionFailed(
                "connection reset during commit".to_string(),
            )));
        }
        let mut rows = self.rows.lock().unwrap();
        for row in batch.inserts.into_iter().chain(batch.updates) {
            rows.insert(row.upsert_key(), row);
        }
        Ok(())
    }
}

pub type InMemoryDevices = InMemoryTable<DeviceRecord>;
pub type InMemoryAssets = InMemoryTable<AssetRecord>;
pub type InMemoryPeople = InMemoryTable<PersonRecord>;

impl DeviceRepositoryTrait for InMemoryDevices {
    fn find_by_serial(&self, serial_number: &str) -> Result<Option<DeviceRecord>> {
        let serial = serial_number.trim().to_uppercase();
        Ok(self
            .rows()
            .into_iter()
            .find(|row| row.serial_number.as_deref() == Some(serial.as_str())))
    }

    fn find_by_asset_tag(&self, asset_tag: &str) -> Result<Option<DeviceRecord>> {
        Ok(self
            .rows()
            .into_iter()
            .find(|row| row.asset_tag.as_deref() == Some(asset_tag)))
    }

    fn list(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>> {
        Ok(self
            .rows()
            .into_iter()
            .filter(|row| filter.status.map_or(true, |status| row.status == status))
            .collect())
    }

    fn list_for_user(&self, email: &str) -> Result<Vec<DeviceRecord>> {
        Ok(self
            .rows()
            .into_iter()
            .filter(|row| row.annotated_user.as_deref() == Some(email))
            .collect())
    }

    fn assignments_by_user(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for row in self.rows() {
            if let Some(user) = row.annotated_user {
                map.entry(user.to_lowercase()).or_default().push(row.device_id);
            }
        }
        Ok(map)
    }
}

impl AssetRepositoryTrait for InMemoryAssets {
    fn find_by_serials(&self, serials: &[String]) -> Result<HashMap<String, AssetRecord>> {
        let mut found = HashMap::new();
        for row in self.rows() {
            if let Some(serial) = row.serial_number.clone() {
                if serials.contains(&serial) {
                    found.insert(serial, row);
                }
            }
        }
        Ok(found)
    }

    fn find_by_tag(&self, asset_tag: &str) -> Result<Option<AssetRecord>> {
        Ok(self
            .rows()
            .into_iter()
            .find(|row| row.asset_tag.as_deref() == Some(asset_tag)))
    }

    fn count(&self) -> Result<i64> {
        Ok(self.len() as i64)
    }
}

#[async_trait]
impl PersonRepositoryTrait for InMemoryPeople {
    fn find_by_email(&self, email: &str) -> Result<Option<PersonRecord>> {
        Ok(self.get(&email.trim().to_lowercase()))
    }

    fn list(&self, filter: &PersonFilter) -> Result<Vec<PersonRecord>> {
        Ok(self
            .rows()
            .into_iter()
            .filter(|row| filter.data_source.map_or(true, |source| row.data_source == source))
            .collect())
    }

    fn fee_candidates(&self) -> Result<Vec<FeeCandidate>> {
        Ok(self
            .rows()
            .into_iter()
            .filter_map(|row| {
                row.tracking_user_id.map(|tracking_user_id| FeeCandidate {
                    email: row.email,
                    tracking_user_id,
                })
            })
            .collect())
    }

    async fn apply_fee_updates(&self, updates: Vec<FeeUpdate>) -> Result<usize> {
        let mut rows = self.rows.lock().unwrap();
        let mut applied = 0;
        for update in updates {
            if let Some(row) = rows.get_mut(&update.email) {
                row.total_fee_balance = update.total_fee_balance;
                row.has_outstanding_fees = update.has_outstanding_fees;
                row.fee_last_synced_at = Some(update.fee_last_synced_at);
                applied += 1;
            }
        }
        Ok(applied)
    }
}

#[derive(Default)]
pub struct InMemoryRunLog {
    runs: Mutex<Vec<RunLog>>,
}

impl InMemoryRunLog {
    pub fn all(&self) -> Vec<RunLog> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunLogRepositoryTrait for InMemoryRunLog {
    async fn create_run(&self, category: RunCategory) -> Result<RunLog> {
        let mut runs = self.runs.lock().unwrap();
        let run = RunLog {
            id: runs.len() as i64 + 1,
            category,
            status: RunStatus::Started,
            records_processed: 0,
            records_created: 0,
            records_updated: 0,
            duration_seconds: None,
            error_message: None,
            details: None,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
        };
        runs.push(run.clone());
        Ok(run)
    }

    async fn mark_running(&self, run_id: i64) -> Result<()> {
        let mut runs = self.runs.lock().unwrap();
        if let Some(run) = runs.iter_mut().find(|run| run.id == run_id) {
            if run.status.can_transition_to(RunStatus::Running) {
                run.status = RunStatus::Running;
            }
        }
        Ok(())
    }

    async fn finish_run(&self, run_id: i64, completion: RunCompletion) -> Result<RunLog> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs
            .iter_mut()
            .find(|run| run.id == run_id)
            .ok_or_else(|| Error::Database(DatabaseError::NotFound(format!("run {}", run_id))))?;
        run.status = completion.status;
        run.records_processed = completion.counters.total_processed();
        run.records_created = completion.counters.total_created();
        run.records_updated = completion.counters.total_updated();
        run.duration_seconds = Some(completion.duration_seconds);
        run.error_message = completion.error_message;
        run.details = Some(completion.counters);
        run.completed_at = Some(Utc::now().to_rfc3339());
        Ok(run.clone())
    }

    fn get_run(&self, run_id: i64) -> Result<Option<RunLog>> {
        Ok(self.all().into_iter().find(|run| run.id == run_id))
    }

    fn recent_runs(&self, limit: i64) -> Result<Vec<RunLog>> {
        let mut runs = self.all();
        runs.reverse();
        runs.truncate(limit.max(0) as usize);
        Ok(runs)
    }
}

#[derive(Default)]
pub struct InMemoryRunLock {
    locks: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

#[async_trait]
impl RunLockRepositoryTrait for InMemoryRunLock {
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let mut locks = self.locks.lock().unwrap();
        let now = Utc::now();
        if let Some((_, expires_at)) = locks.get(name) {
            if *expires_at > now {
                return Ok(false);
            }
        }
        locks.insert(name.to_string(), (holder.to_string(), now + ttl));
        Ok(true)
    }

    async fn release(&self, name: &str, holder: &str) -> Result<bool> {
        let mut locks = self.locks.lock().unwrap();
        if locks.get(name).is_some_and(|(owner, _)| owner == holder) {
            locks.remove(name);
            return Ok(true);
        }
        Ok(false)
    }

    fn current_holder(&self, name: &str) -> Result<Option<String>> {
        let locks = self.locks.lock().unwrap();
        Ok(locks
            .get(name)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(holder, _)| holder.clone()))
    }
}

// ── Providers ────────────────────────────────────────────────────────────────

fn pages(pages: Vec<Vec<RawRecord>>, fail_at: Option<usize>, system: UpstreamSystem) -> PageStream<'static> {
    let fail_at = fail_at.map(|index| index.min(pages.len()));
    let mut items: Vec<Result<Vec<RawRecord>>> = Vec::new();
    for (index, page) in pages.into_iter().enumerate() {
        if fail_at == Some(index) {
            break;
        }
        items.push(Ok(page));
    }
    if fail_at.is_some() {
        items.push(Err(Error::upstream(system, Some(503), "page fetch failed")));
    }
    stream::iter(items).boxed()
}

#[derive(Default)]
pub struct FakeDirectory {
    pub device_pages: Mutex<Vec<Vec<RawRecord>>>,
    pub user_pages: Mutex<Vec<Vec<RawRecord>>>,
    /// Device page index at which listing fails.
    pub fail_devices_at: Mutex<Option<usize>>,
}

impl FakeDirectory {
    pub fn new(device_pages: Vec<Vec<RawRecord>>, user_pages: Vec<Vec<RawRecord>>) -> Self {
        Self {
            device_pages: Mutex::new(device_pages),
            user_pages: Mutex::new(user_pages),
            fail_devices_at: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DirectoryProvider for FakeDirectory {
    fn list_devices(&self, _query: Option<String>, _max_results: usize) -> PageStream<'_> {
        pages(
            self.device_pages.lock().unwrap().clone(),
            *self.fail_devices_at.lock().unwrap(),
            UpstreamSystem::Directory,
        )
    }

    fn list_users(&self, _max_results: usize) -> PageStream<'_> {
        pages(self.user_pages.lock().unwrap().clone(), None, UpstreamSystem::Directory)
    }

    async fn get_user(&self, email: &str) -> Result<Option<RawRecord>> {
        Ok(self
            .user_pages
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .find(|user| user["primaryEmail"].as_str() == Some(email))
            .cloned())
    }
}

#[derive(Default)]
pub struct FakeTelemetry {
    pub pages: Mutex<Vec<Vec<RawRecord>>>,
}

impl TelemetryProvider for FakeTelemetry {
    fn list_battery_telemetry(&self) -> PageStream<'_> {
        pages(self.pages.lock().unwrap().clone(), None, UpstreamSystem::Directory)
    }
}

#[derive(Default)]
pub struct FakeAssetService {
    pub asset_pages: Mutex<Vec<Vec<RawRecord>>>,
    /// Full tracking-user listing, served in slices of the requested page size.
    pub users: Mutex<Vec<RawRecord>>,
    fees: Mutex<HashMap<String, Decimal>>,
    failing_fees: Mutex<Vec<String>>,
    no_fee_endpoint: Mutex<bool>,
}

impl FakeAssetService {
    pub fn new(asset_pages: Vec<Vec<RawRecord>>, users: Vec<RawRecord>) -> Self {
        Self {
            asset_pages: Mutex::new(asset_pages),
            users: Mutex::new(users),
            ..Default::default()
        }
    }

    pub fn set_fee(&self, user_id: &str, balance: Decimal) {
        self.fees.lock().unwrap().insert(user_id.to_string(), balance);
    }

    pub fn fail_fee(&self, user_id: &str) {
        self.failing_fees.lock().unwrap().push(user_id.to_string());
    }

    pub fn disable_fee_endpoint(&self) {
        *self.no_fee_endpoint.lock().unwrap() = true;
    }
}

#[async_trait]
impl AssetServiceProvider for FakeAssetService {
    fn search_assets(&self, _query: String, _limit: usize) -> PageStream<'_> {
        pages(self.asset_pages.lock().unwrap().clone(), None, UpstreamSystem::AssetService)
    }

    async fn get_asset_by_tag(&self, asset_tag: &str) -> Result<Option<RawRecord>> {
        Ok(self
            .asset_pages
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .find(|asset| asset["AssetTag"].as_str() == Some(asset_tag))
            .cloned())
    }

    async fn get_users(&self, page: usize, page_size: usize) -> Result<Vec<RawRecord>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .skip(page * page_size)
            .take(page_size)
            .cloned()
            .collect())
    }

    async fn get_user_fees(&self, user_id: &str) -> Result<FeeBalance> {
        if *self.no_fee_endpoint.lock().unwrap() {
            return Ok(FeeBalance::default());
        }
        if self.failing_fees.lock().unwrap().iter().any(|id| id == user_id) {
            return Err(Error::upstream(UpstreamSystem::AssetService, Some(500), "fee lookup failed"));
        }
        Ok(FeeBalance {
            total_balance: self.fees.lock().unwrap().get(user_id).copied(),
            fees: Vec::new(),
            endpoint_found: true,
        })
    }
}

#[derive(Default)]
pub struct FakeLocation {
    pub sightings: Mutex<HashMap<String, RawRecord>>,
}

#[async_trait]
impl LocationProvider for FakeLocation {
    async fn get_device_by_mac(&self, mac_address: &str) -> Result<Option<RawRecord>> {
        Ok(self.sightings.lock().unwrap().get(mac_address).cloned())
    }
}

struct IdleMemory;

impl MemorySampler for IdleMemory {
    fn used_percent(&self) -> f64 {
        10.0
    }
}

pub fn idle_memory() -> Arc<dyn MemorySampler> {
    Arc::new(IdleMemory)
}
