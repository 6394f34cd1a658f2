//! Run log and run lock tables.

mod lock_repository;
mod model;
mod repository;

pub use lock_repository::RunLockRepository;
pub use model::{NewRunLogDB, RunLockDB, RunLogDB};
pub use repository::RunLogRepository;
