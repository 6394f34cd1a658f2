use async_trait::async_trait;
use chrono::Duration;

use crate::errors::Result;

use super::{RunCategory, RunCompletion, RunLog};

/// Durable, append-only run log.
#[async_trait]
pub trait RunLogRepositoryTrait: Send + Sync {
    /// Inserts a new row with status `started`.
    async fn create_run(&self, category: RunCategory) -> Result<RunLog>;

    /// Moves a started run to `running`. Terminal rows are left alone.
    async fn mark_running(&self, run_id: i64) -> Result<()>;

    /// Writes the terminal status, counters, duration and error.
    async fn finish_run(&self, run_id: i64, completion: RunCompletion) -> Result<RunLog>;

    fn get_run(&self, run_id: i64) -> Result<Option<RunLog>>;

    /// Most recent runs first.
    fn recent_runs(&self, limit: i64) -> Result<Vec<RunLog>>;
}

/// Time-boxed mutual exclusion between runs, shared through the database.
#[async_trait]
pub trait RunLockRepositoryTrait: Send + Sync {
    /// Takes the named lock for `holder` unless another holder has an unexpired claim.
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool>;

    /// Releases the lock if `holder` still owns it. Returns whether a row was removed.
    async fn release(&self, name: &str, holder: &str) -> Result<bool>;

    /// Current holder of an unexpired lock, if any.
    fn current_holder(&self, name: &str) -> Result<Option<String>>;
}
