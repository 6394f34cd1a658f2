//! Pipeline defaults.

/// Rows per committed transaction.
pub const DEFAULT_COMMIT_BATCH_SIZE: usize = 100;

/// Concurrent tracking-system user page fetches.
pub const DEFAULT_PAGE_WORKERS: usize = 5;

/// Concurrent fee lookups.
pub const DEFAULT_FEE_WORKERS: usize = 10;

/// System memory utilization above which parallel submission pauses.
pub const DEFAULT_MEMORY_CEILING_PERCENT: f64 = 75.0;

/// Interval between memory samples while paused.
pub const MEMORY_POLL_INTERVAL_SECS: u64 = 3;

/// Longest total pause before work is submitted anyway.
pub const MEMORY_MAX_WAIT_SECS: u64 = 60;

/// Run lock expiry.
pub const DEFAULT_RUN_LOCK_TTL_SECS: i64 = 60 * 60;

/// Name of the single pipeline lock.
pub const FULL_RUN_LOCK_NAME: &str = "sync:lock:full";

/// Upper bound on directory devices fetched per run.
pub const DEFAULT_MAX_DEVICES: usize = 100_000;

/// Upper bound on assets fetched per run.
pub const DEFAULT_MAX_ASSETS: usize = 100_000;

/// Upper bound on directory users fetched per run.
pub const DEFAULT_MAX_USERS: usize = 100_000;

/// Page size requested from the tracking system's user listing.
pub const DEFAULT_TRACKING_USER_PAGE_SIZE: usize = 100;

/// Progress entries retained in memory for status polling.
pub const PROGRESS_LOG_CAPACITY: usize = 500;

/// Read-through cache TTL for point lookups.
pub const QUERY_CACHE_TTL_SECS: u64 = 900;

/// TTL for cached "not found" answers.
pub const NOT_FOUND_CACHE_TTL_SECS: u64 = 300;

/// TTL for aggregate device reports. Runs clear them sooner.
pub const REPORT_CACHE_TTL_SECS: u64 = 43_200;

/// Days without a directory check-in before an active device counts as a ghost.
pub const GHOST_DEVICE_DAYS: i64 = 90;

/// Default battery health percentage at or below which a battery is poor.
pub const DEFAULT_POOR_BATTERY_PERCENT: i32 = 30;

/// TTL for the last-run summary entry.
pub const SYNC_STATUS_CACHE_TTL_SECS: u64 = 86_400;
