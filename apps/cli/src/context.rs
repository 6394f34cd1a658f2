//! Service wiring for one process.

use std::sync::Arc;

use anyhow::Result;
use log::info;

use fleetsync_core::cache::{CacheStore, MemoryCache};
use fleetsync_core::constants::PROGRESS_LOG_CAPACITY;
use fleetsync_core::queries::{QueryService, QueryServiceTrait};
use fleetsync_core::sync::{Pipeline, ProgressLog, RunService, SyncSources, SyncStores};
use fleetsync_core::upstream::{LocationProvider, TelemetryProvider};
use fleetsync_storage_sqlite::{
    db, AssetRepository, DeviceRepository, PersonRepository, RunLockRepository, RunLogRepository,
};
use fleetsync_upstream::{AssetServiceClient, DirectoryClient, LocationClient, RetryPolicy};

use crate::config::AppConfig;

const QUERY_CACHE_CAPACITY: usize = 10_000;

pub struct ServiceContext {
    pub run_service: Arc<RunService>,
    pub query_service: Arc<dyn QueryServiceTrait>,
}

impl ServiceContext {
    pub fn run_service(&self) -> Arc<RunService> {
        Arc::clone(&self.run_service)
    }

    pub fn query_service(&self) -> Arc<dyn QueryServiceTrait> {
        Arc::clone(&self.query_service)
    }
}

pub fn initialize_context(config: &AppConfig) -> Result<ServiceContext> {
    let db_path = db::init(&config.data_dir)?;
    db::run_migrations(&db_path)?;
    let pool = db::create_pool(&db_path)?;
    let writer = db::spawn_writer(pool.as_ref().clone());
    info!("[Startup] database ready at {}", db_path);

    let devices = Arc::new(DeviceRepository::new(pool.clone(), writer.clone()));
    let assets = Arc::new(AssetRepository::new(pool.clone(), writer.clone()));
    let people = Arc::new(PersonRepository::new(pool.clone(), writer.clone()));
    let run_log = Arc::new(RunLogRepository::new(pool.clone(), writer.clone()));
    let run_lock = Arc::new(RunLockRepository::new(pool, writer));

    let policy = RetryPolicy::default();
    let directory = Arc::new(DirectoryClient::new(config.directory.clone(), policy.clone())?);
    let asset_service = Arc::new(AssetServiceClient::new(
        config.asset_service.clone(),
        policy.clone(),
    )?);
    let location: Option<Arc<dyn LocationProvider>> = match &config.location {
        Some(location) => Some(Arc::new(LocationClient::new(location.clone(), policy)?)),
        None => {
            info!("[Startup] location service not configured; AP lookups disabled");
            None
        }
    };
    let telemetry: Arc<dyn TelemetryProvider> = directory.clone();

    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new(QUERY_CACHE_CAPACITY));
    let progress = Arc::new(ProgressLog::new(PROGRESS_LOG_CAPACITY));

    let sources = SyncSources {
        directory,
        telemetry: Some(telemetry),
        asset_service,
        location,
    };
    let stores = SyncStores {
        devices: devices.clone(),
        assets,
        people: people.clone(),
        run_log: run_log.clone(),
        run_lock,
    };
    let pipeline = Arc::new(Pipeline::new(
        sources,
        stores,
        config.pipeline.clone(),
        Arc::clone(&progress),
    ));
    let run_service = Arc::new(RunService::new(pipeline, progress).with_cache(Arc::clone(&cache)));
    let query_service: Arc<dyn QueryServiceTrait> =
        Arc::new(QueryService::new(devices, people, run_log, cache));

    Ok(ServiceContext {
        run_service,
        query_service,
    })
}
