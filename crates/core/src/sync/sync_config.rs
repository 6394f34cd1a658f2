use crate::constants::{
    DEFAULT_COMMIT_BATCH_SIZE, DEFAULT_FEE_WORKERS, DEFAULT_MAX_ASSETS, DEFAULT_MAX_DEVICES,
    DEFAULT_MAX_USERS, DEFAULT_PAGE_WORKERS, DEFAULT_RUN_LOCK_TTL_SECS, DEFAULT_TRACKING_USER_PAGE_SIZE,
};
use crate::resources::MemoryGuardConfig;

/// Tunables for one pipeline instance. Built by the caller; the core never
/// reads the environment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rows per committed transaction.
    pub batch_size: usize,
    /// Concurrent tracking-user page fetches and location lookups.
    pub page_workers: usize,
    pub fee_workers: usize,
    pub tracking_user_page_size: usize,
    pub max_devices: usize,
    pub max_assets: usize,
    pub max_users: usize,
    pub lock_ttl: chrono::Duration,
    pub memory: MemoryGuardConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_COMMIT_BATCH_SIZE,
            page_workers: DEFAULT_PAGE_WORKERS,
            fee_workers: DEFAULT_FEE_WORKERS,
            tracking_user_page_size: DEFAULT_TRACKING_USER_PAGE_SIZE,
            max_devices: DEFAULT_MAX_DEVICES,
            max_assets: DEFAULT_MAX_ASSETS,
            max_users: DEFAULT_MAX_USERS,
            lock_ttl: chrono::Duration::seconds(DEFAULT_RUN_LOCK_TTL_SECS),
            memory: MemoryGuardConfig::default(),
        }
    }
}
