//! Run log models.

use serde::{Deserialize, Serialize};

use crate::fees::FeeCounters;
use crate::upsert::UpsertCounters;

/// Which pipeline stages a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunCategory {
    Full,
    DevicesOnly,
    UsersOnly,
    Assets,
}

impl RunCategory {
    pub fn includes_assets(&self) -> bool {
        matches!(self, Self::Full | Self::Assets)
    }

    pub fn includes_devices(&self) -> bool {
        matches!(self, Self::Full | Self::DevicesOnly)
    }

    pub fn includes_people(&self) -> bool {
        matches!(self, Self::Full | Self::UsersOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::DevicesOnly => "devices_only",
            Self::UsersOnly => "users_only",
            Self::Assets => "assets",
        }
    }
}

impl std::str::FromStr for RunCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "full" => Ok(Self::Full),
            "devices_only" | "devices" => Ok(Self::DevicesOnly),
            "users_only" | "users" => Ok(Self::UsersOnly),
            "assets" => Ok(Self::Assets),
            other => Err(format!("Unknown run category '{}'", other)),
        }
    }
}

/// Run lifecycle status. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Started,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Allowed moves: started -> running -> {completed, failed}, or started -> {completed, failed}.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match (self, next) {
            (Self::Started, Self::Running) => true,
            (Self::Started | Self::Running, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }
}

/// Per-entity counters accumulated during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounters {
    pub assets: UpsertCounters,
    pub devices: UpsertCounters,
    pub people: UpsertCounters,
    pub fees: FeeCounters,
    /// Tracking-system people with no directory account.
    pub tracking_only_people: usize,
}

impl RunCounters {
    pub fn total_processed(&self) -> i64 {
        (self.assets.processed + self.devices.processed + self.people.processed) as i64
    }

    pub fn total_created(&self) -> i64 {
        (self.assets.created + self.devices.created + self.people.created) as i64
    }

    pub fn total_updated(&self) -> i64 {
        (self.assets.updated + self.devices.updated + self.people.updated) as i64
    }
}

/// One row of the durable run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLog {
    pub id: i64,
    pub category: RunCategory,
    pub status: RunStatus,
    pub records_processed: i64,
    pub records_created: i64,
    pub records_updated: i64,
    pub duration_seconds: Option<i64>,
    pub error_message: Option<String>,
    pub details: Option<RunCounters>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Terminal outcome written back to a run log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub counters: RunCounters,
    pub duration_seconds: i64,
    pub error_message: Option<String>,
}
