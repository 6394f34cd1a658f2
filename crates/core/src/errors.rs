//! Error types shared by every fleetsync crate.

use thiserror::Error;

/// Result type alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Upstream system a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamSystem {
    Directory,
    AssetService,
    LocationService,
}

impl std::fmt::Display for UpstreamSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Directory => "directory",
            Self::AssetService => "asset_service",
            Self::LocationService => "location_service",
        };
        f.write_str(name)
    }
}

/// Persistence failures, kept separate so storage backends can map into them.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// A call to an external system failed after retries were exhausted.
    #[error("Upstream {system} error ({status:?}): {message}")]
    Upstream {
        system: UpstreamSystem,
        status: Option<u16>,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn upstream(system: UpstreamSystem, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            system,
            status,
            message: message.into(),
        }
    }

    pub fn sync(message: impl Into<String>) -> Self {
        Self::Sync(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for failures that belong to the persistence layer and must abort a run.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
