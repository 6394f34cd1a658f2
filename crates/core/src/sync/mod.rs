//! Reconciliation pipeline and run orchestration.

mod pipeline;
mod progress;
mod run_service;
mod sync_config;

pub use pipeline::{Pipeline, SyncSources, SyncStores};
pub use progress::{ProgressEntry, ProgressLog, Severity};
pub use run_service::{RunService, RunServiceTrait, RunStatusView, RunnerState, StartRunOutcome};
pub use sync_config::PipelineConfig;
