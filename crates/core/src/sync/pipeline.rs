//! The staged reconciliation pipeline.
//!
//! Stage order within a run is fixed: assets, then devices, then people and
//! their fees. Assets come first so the device stage can join against them,
//! and devices come before people so assignment counts reflect this run.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use log::{debug, warn};

use crate::assets::{AssetRepositoryTrait, NormalizedAsset};
use crate::devices::{BatteryTelemetry, DeviceRepositoryTrait, DirectoryDevice, LocationFields, TrackingFields};
use crate::errors::Result;
use crate::extraction::{
    decode_page, extract_asset, extract_battery_sample, extract_directory_device,
    extract_directory_person, extract_location_sample, extract_tracking_person, DecodeStats,
};
use crate::fees::FeePhase;
use crate::identity::{device_join_key, person_join_key, JoinIndex};
use crate::merge::{merge_asset, merge_device, merge_person, DeviceSources, PersonSources};
use crate::people::{DirectoryPerson, PersonRepositoryTrait, TrackingPerson};
use crate::resources::MemoryGuard;
use crate::runs::{RunCategory, RunCounters, RunLockRepositoryTrait, RunLogRepositoryTrait};
use crate::upsert::{upsert_in_batches, UpsertCounters};
use crate::upstream::{AssetServiceProvider, DirectoryProvider, LocationProvider, TelemetryProvider};

use super::{PipelineConfig, ProgressLog};

/// Upstream systems a pipeline reads from.
#[derive(Clone)]
pub struct SyncSources {
    pub directory: Arc<dyn DirectoryProvider>,
    /// Battery telemetry; battery fields are left as stored when absent.
    pub telemetry: Option<Arc<dyn TelemetryProvider>>,
    pub asset_service: Arc<dyn AssetServiceProvider>,
    /// Wireless location lookups; skipped when absent.
    pub location: Option<Arc<dyn LocationProvider>>,
}

/// Repositories the pipeline and run service write through.
#[derive(Clone)]
pub struct SyncStores {
    pub devices: Arc<dyn DeviceRepositoryTrait>,
    pub assets: Arc<dyn AssetRepositoryTrait>,
    pub people: Arc<dyn PersonRepositoryTrait>,
    pub run_log: Arc<dyn RunLogRepositoryTrait>,
    pub run_lock: Arc<dyn RunLockRepositoryTrait>,
}

pub struct Pipeline {
    sources: SyncSources,
    stores: SyncStores,
    config: PipelineConfig,
    guard: Arc<MemoryGuard>,
    progress: Arc<ProgressLog>,
}

impl Pipeline {
    pub fn new(
        sources: SyncSources,
        stores: SyncStores,
        config: PipelineConfig,
        progress: Arc<ProgressLog>,
    ) -> Self {
        let guard = Arc::new(MemoryGuard::system(config.memory.clone()));
        Self {
            sources,
            stores,
            config,
            guard,
            progress,
        }
    }

    /// Replaces the host-backed memory guard.
    pub fn with_memory_guard(mut self, guard: Arc<MemoryGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn stores(&self) -> &SyncStores {
        &self.stores
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Executes the stages `category` selects.
    ///
    /// Any error is fatal to the run. `counters` then holds what was durably
    /// committed before the failure.
    pub async fn run(&self, category: RunCategory, counters: &mut RunCounters) -> Result<()> {
        let synced_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut asset_index = JoinIndex::default();

        if category.includes_assets() {
            self.progress.info("Fetching assets from the asset service");
            self.sync_assets(counters, &mut asset_index, &synced_at)
                .await?;
            self.progress.publish(counters);
            self.progress.success(stage_summary("Assets", &counters.assets));
        }

        if category.includes_devices() {
            let battery = self.load_battery_index().await;
            self.progress.info("Fetching devices from the directory");
            self.sync_devices(counters, &asset_index, &battery, &synced_at)
                .await?;
            self.progress.publish(counters);
            self.progress.success(stage_summary("Devices", &counters.devices));
        }
        drop(asset_index);

        if category.includes_people() {
            self.progress.info("Fetching people from the directory and the asset service");
            self.sync_people(counters, &synced_at).await?;
            self.progress.publish(counters);
            self.progress.success(stage_summary("People", &counters.people));
            if counters.tracking_only_people > 0 {
                self.progress.info(format!(
                    "{} people exist only in the asset service",
                    counters.tracking_only_people
                ));
            }

            self.progress.info("Refreshing fee balances");
            FeePhase::new(
                Arc::clone(&self.sources.asset_service),
                Arc::clone(&self.stores.people),
                Arc::clone(&self.guard),
            )
            .with_workers(self.config.fee_workers)
            .with_batch_size(self.config.batch_size)
            .run(&mut counters.fees)
            .await?;
            self.progress.publish(counters);
            self.progress.success(format!(
                "Fees: {} updated, {} failed",
                counters.fees.updated, counters.fees.failed
            ));
        }

        Ok(())
    }

    async fn sync_assets(
        &self,
        counters: &mut RunCounters,
        index: &mut JoinIndex<NormalizedAsset>,
        synced_at: &str,
    ) -> Result<()> {
        let mut pages = self
            .sources
            .asset_service
            .search_assets(String::new(), self.config.max_assets);
        let mut pending: Vec<NormalizedAsset> = Vec::new();

        while let Some(page) = pages.next().await {
            let (assets, stats) = decode_page("asset", page?, extract_asset);
            counters.assets.skipped += stats.skipped();
            index.extend(assets.iter().cloned(), |asset| {
                device_join_key(asset.serial_number.as_deref())
            });
            pending.extend(assets);

            let ready = full_batches(pending.len(), self.config.batch_size);
            if ready > 0 {
                self.write_assets(pending.drain(..ready), &mut counters.assets, synced_at)
                    .await?;
                self.progress.publish(counters);
            }
        }
        self.write_assets(pending, &mut counters.assets, synced_at)
            .await?;
        debug!(
            "[Sync] asset index holds {} serials ({} assets without one)",
            index.len(),
            index.missing_key()
        );
        Ok(())
    }

    async fn write_assets(
        &self,
        assets: impl IntoIterator<Item = NormalizedAsset>,
        counters: &mut UpsertCounters,
        synced_at: &str,
    ) -> Result<()> {
        upsert_in_batches(
            &*self.stores.assets,
            assets,
            self.config.batch_size,
            counters,
            |asset: &NormalizedAsset| Some(asset.asset_id.clone()),
            |existing, asset| merge_asset(existing, asset, synced_at),
        )
        .await
    }

    /// Battery samples keyed by directory device id. Telemetry failures only
    /// cost battery freshness, so they are logged and the partial index kept.
    async fn load_battery_index(&self) -> HashMap<String, BatteryTelemetry> {
        let mut index = HashMap::new();
        let Some(telemetry) = self.sources.telemetry.as_ref() else {
            return index;
        };

        let mut pages = telemetry.list_battery_telemetry();
        while let Some(page) = pages.next().await {
            match page {
                Ok(records) => {
                    let (samples, _) = decode_page("battery telemetry", records, extract_battery_sample);
                    for sample in samples {
                        index.insert(sample.device_id, sample.battery);
                    }
                }
                Err(err) => {
                    self.progress.warning(format!(
                        "Battery telemetry unavailable after {} devices: {}",
                        index.len(),
                        err
                    ));
                    break;
                }
            }
        }
        index
    }

    async fn sync_devices(
        &self,
        counters: &mut RunCounters,
        asset_index: &JoinIndex<NormalizedAsset>,
        battery: &HashMap<String, BatteryTelemetry>,
        synced_at: &str,
    ) -> Result<()> {
        let mut pages = self
            .sources
            .directory
            .list_devices(None, self.config.max_devices);
        let mut pending: Vec<DeviceSources> = Vec::new();
        let mut decode_stats = DecodeStats::default();

        while let Some(page) = pages.next().await {
            let (devices, stats) = decode_page("directory device", page?, extract_directory_device);
            counters.devices.skipped += stats.skipped();
            decode_stats.absorb(stats);

            let mut tracking = self.resolve_tracking(&devices, asset_index)?;
            let mut locations = self.resolve_locations(&devices).await;

            pending.extend(devices.into_iter().map(|directory| DeviceSources {
                tracking: tracking.remove(&directory.device_id),
                battery: battery.get(&directory.device_id).cloned(),
                location: locations.remove(&directory.device_id),
                directory,
            }));

            let ready = full_batches(pending.len(), self.config.batch_size);
            if ready > 0 {
                self.write_devices(pending.drain(..ready), &mut counters.devices, synced_at)
                    .await?;
                self.progress.publish(counters);
            }
        }
        self.write_devices(pending, &mut counters.devices, synced_at)
            .await?;

        if decode_stats.malformed > 0 {
            self.progress.warning(format!(
                "Skipped {} malformed directory device records",
                decode_stats.malformed
            ));
        }
        Ok(())
    }

    async fn write_devices(
        &self,
        devices: impl IntoIterator<Item = DeviceSources>,
        counters: &mut UpsertCounters,
        synced_at: &str,
    ) -> Result<()> {
        upsert_in_batches(
            &*self.stores.devices,
            devices,
            self.config.batch_size,
            counters,
            |sources: &DeviceSources| Some(sources.directory.device_id.clone()),
            |existing, sources| merge_device(existing, sources, synced_at),
        )
        .await
    }

    /// Tracking fields per device id. The in-run asset index is consulted
    /// first; misses fall back to the stored asset table.
    fn resolve_tracking(
        &self,
        devices: &[DirectoryDevice],
        asset_index: &JoinIndex<NormalizedAsset>,
    ) -> Result<HashMap<String, TrackingFields>> {
        let mut resolved = HashMap::with_capacity(devices.len());
        let mut misses: Vec<(String, String)> = Vec::new();

        for device in devices {
            let Some(serial) = device_join_key(device.serial_number.as_deref()) else {
                continue;
            };
            match asset_index.get(&serial) {
                Some(asset) => {
                    resolved.insert(device.device_id.clone(), asset.tracking_fields());
                }
                None => misses.push((device.device_id.clone(), serial)),
            }
        }

        if !misses.is_empty() {
            let serials = misses.iter().map(|(_, serial)| serial.clone()).collect::<Vec<_>>();
            let stored = self.stores.assets.find_by_serials(&serials)?;
            for (device_id, serial) in misses {
                if let Some(asset) = stored.get(&serial) {
                    resolved.insert(device_id, asset.tracking_fields());
                }
            }
        }
        Ok(resolved)
    }

    /// Last wireless sighting per device id, for devices with a MAC.
    async fn resolve_locations(&self, devices: &[DirectoryDevice]) -> HashMap<String, LocationFields> {
        let Some(location) = self.sources.location.as_ref() else {
            return HashMap::new();
        };

        let lookups = devices
            .iter()
            .filter_map(|device| {
                device
                    .mac_address
                    .clone()
                    .map(|mac| (device.device_id.clone(), mac))
            })
            .collect::<Vec<_>>();

        stream::iter(lookups)
            .map(|(device_id, mac)| async move {
                self.guard.wait_for_headroom().await;
                let found = location.get_device_by_mac(&mac).await;
                (device_id, mac, found)
            })
            .buffer_unordered(self.config.page_workers.max(1))
            .filter_map(|(device_id, mac, found)| async move {
                match found {
                    Ok(Some(raw)) => match extract_location_sample(&raw) {
                        Ok(sample) => sample.map(|fields| (device_id, fields)),
                        Err(err) => {
                            warn!("[Sync] unusable location record for {}: {}", mac, err);
                            None
                        }
                    },
                    Ok(None) => None,
                    Err(err) => {
                        warn!("[Sync] location lookup for {} failed: {}", mac, err);
                        None
                    }
                }
            })
            .collect::<HashMap<_, _>>()
            .await
    }

    async fn sync_people(&self, counters: &mut RunCounters, synced_at: &str) -> Result<()> {
        let mut directory = JoinIndex::<DirectoryPerson>::default();
        let mut pages = self.sources.directory.list_users(self.config.max_users);
        while let Some(page) = pages.next().await {
            let (people, stats) = decode_page("directory user", page?, extract_directory_person);
            counters.people.skipped += stats.skipped();
            directory.extend(people, |person| person_join_key(person.email.as_deref()));
        }

        let (tracking_people, stats) = self.fetch_tracking_people().await?;
        counters.people.skipped += stats.skipped();
        let mut tracking = JoinIndex::build(tracking_people, |person: &TrackingPerson| {
            person_join_key(person.email.as_deref())
        });
        counters.people.skipped += directory.missing_key() + tracking.missing_key();

        counters.tracking_only_people = tracking
            .keys()
            .filter(|email| !directory.contains(email))
            .count();

        let emails = directory
            .keys()
            .chain(tracking.keys())
            .cloned()
            .collect::<BTreeSet<_>>();
        let sources = emails
            .into_iter()
            .map(|email| PersonSources {
                directory: directory.remove(&email),
                tracking: tracking.remove(&email),
                email,
            })
            .collect::<Vec<_>>();

        let assignments = self.stores.devices.assignments_by_user()?;
        debug!(
            "[Sync] merging {} people against {} device assignees",
            sources.len(),
            assignments.len()
        );

        upsert_in_batches(
            &*self.stores.people,
            sources,
            self.config.batch_size,
            &mut counters.people,
            |sources: &PersonSources| Some(sources.email.clone()),
            |existing, sources| {
                let devices = assignments.get(&sources.email).cloned().unwrap_or_default();
                merge_person(existing, sources, devices, synced_at)
            },
        )
        .await
    }

    /// Pages through the asset service's users in waves of `page_workers`
    /// concurrent requests until a short or empty page.
    async fn fetch_tracking_people(&self) -> Result<(Vec<TrackingPerson>, DecodeStats)> {
        let page_size = self.config.tracking_user_page_size.max(1);
        let workers = self.config.page_workers.max(1);
        let mut people = Vec::new();
        let mut stats = DecodeStats::default();
        let mut next_page = 0usize;

        'waves: loop {
            self.guard.wait_for_headroom().await;
            let wave = (next_page..next_page + workers).map(|page| async move {
                self.sources.asset_service.get_users(page, page_size).await
            });
            let results = join_all(wave).await;
            next_page += workers;

            for result in results {
                let records = result?;
                let fetched = records.len();
                if fetched == 0 {
                    break 'waves;
                }
                let (decoded, page_stats) = decode_page("tracking user", records, extract_tracking_person);
                stats.absorb(page_stats);
                people.extend(decoded);
                if fetched < page_size || people.len() >= self.config.max_users {
                    break 'waves;
                }
            }
            debug!("[Sync] fetched {} tracking users so far", people.len());
        }

        Ok((people, stats))
    }
}

/// Largest multiple of `batch_size` not above `len`.
fn full_batches(len: usize, batch_size: usize) -> usize {
    let batch_size = batch_size.max(1);
    len - len % batch_size
}

fn stage_summary(stage: &str, counters: &UpsertCounters) -> String {
    format!(
        "{}: {} processed, {} created, {} updated, {} unchanged, {} skipped",
        stage,
        counters.processed,
        counters.created,
        counters.updated,
        counters.unchanged,
        counters.skipped
    )
}
