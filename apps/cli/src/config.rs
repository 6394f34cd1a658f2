//! Environment-backed configuration.

use std::str::FromStr;

use anyhow::{anyhow, Result};

use fleetsync_core::constants::{
    DEFAULT_COMMIT_BATCH_SIZE, DEFAULT_FEE_WORKERS, DEFAULT_MAX_ASSETS, DEFAULT_MAX_DEVICES,
    DEFAULT_MEMORY_CEILING_PERCENT, DEFAULT_PAGE_WORKERS, DEFAULT_RUN_LOCK_TTL_SECS,
};
use fleetsync_core::resources::MemoryGuardConfig;
use fleetsync_core::sync::PipelineConfig;
use fleetsync_upstream::asset_service::DEFAULT_PRODUCT_ID;
use fleetsync_upstream::{AssetServiceConfig, DirectoryConfig, LocationConfig};

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_LOCATION_URL: &str = "https://api.meraki.com/api/v1";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: String,
    pub directory: DirectoryConfig,
    pub asset_service: AssetServiceConfig,
    /// Present only when both the API key and the organization id are set.
    pub location: Option<LocationConfig>,
    pub pipeline: PipelineConfig,
}

/// Trimmed, non-empty lookups over some key/value source.
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| anyhow!("{} must be set", key))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|err| anyhow!("{} has an invalid value '{}': {}", key, raw, err)),
            None => Ok(default),
        }
    }
}

impl AppConfig {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("[Config] loaded {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let directory_defaults = DirectoryConfig::default();

        let directory = DirectoryConfig {
            base_url: vars.or("DIRECTORY_API_URL", &directory_defaults.base_url),
            telemetry_url: vars.or("DIRECTORY_TELEMETRY_URL", &directory_defaults.telemetry_url),
            customer_id: vars.or("DIRECTORY_CUSTOMER_ID", &directory_defaults.customer_id),
            access_token: vars.required("DIRECTORY_ACCESS_TOKEN")?,
        };

        let asset_service = AssetServiceConfig {
            base_url: vars.required("ASSET_SERVICE_URL")?,
            token: vars.required("ASSET_SERVICE_TOKEN")?,
            site_id: vars.required("ASSET_SERVICE_SITE_ID")?,
            product_id: vars.or("ASSET_SERVICE_PRODUCT_ID", DEFAULT_PRODUCT_ID),
        };

        let location = match (
            vars.get("LOCATION_SERVICE_API_KEY"),
            vars.get("LOCATION_SERVICE_ORG_ID"),
        ) {
            (Some(api_key), Some(org_id)) => Some(LocationConfig {
                base_url: vars.or("LOCATION_SERVICE_URL", DEFAULT_LOCATION_URL),
                api_key,
                org_id,
            }),
            _ => None,
        };

        let lock_ttl_secs: i64 = vars.parsed("FLEETSYNC_LOCK_TTL_SECS", DEFAULT_RUN_LOCK_TTL_SECS)?;
        if lock_ttl_secs <= 0 {
            return Err(anyhow!("FLEETSYNC_LOCK_TTL_SECS must be positive"));
        }
        let ceiling: f64 = vars.parsed("FLEETSYNC_MEMORY_CEILING_PCT", DEFAULT_MEMORY_CEILING_PERCENT)?;
        if !(1.0..=100.0).contains(&ceiling) {
            return Err(anyhow!("FLEETSYNC_MEMORY_CEILING_PCT must be between 1 and 100"));
        }

        let pipeline = PipelineConfig {
            batch_size: vars.parsed("FLEETSYNC_BATCH_SIZE", DEFAULT_COMMIT_BATCH_SIZE)?.max(1),
            page_workers: vars.parsed("FLEETSYNC_PAGE_WORKERS", DEFAULT_PAGE_WORKERS)?.max(1),
            fee_workers: vars.parsed("FLEETSYNC_FEE_WORKERS", DEFAULT_FEE_WORKERS)?.max(1),
            max_devices: vars.parsed("FLEETSYNC_MAX_DEVICES", DEFAULT_MAX_DEVICES)?,
            max_assets: vars.parsed("FLEETSYNC_MAX_ASSETS", DEFAULT_MAX_ASSETS)?,
            lock_ttl: chrono::Duration::seconds(lock_ttl_secs),
            memory: MemoryGuardConfig {
                ceiling_percent: ceiling,
                ..Default::default()
            },
            ..Default::default()
        };

        Ok(Self {
            data_dir: vars.or("FLEETSYNC_DATA_DIR", DEFAULT_DATA_DIR),
            directory,
            asset_service,
            location,
            pipeline,
        })
    }
}
