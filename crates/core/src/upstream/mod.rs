//! Contracts the pipeline consumes from the upstream adapters.
//!
//! Adapters hand back raw JSON records; typing happens in `extraction`.
//! Listing operations return a [`PageStream`] so callers can process one
//! page at a time or collect everything, and restarting a listing means
//! calling the method again.

mod raw;

pub use raw::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use rust_decimal::Decimal;

use crate::errors::Result;

/// One record exactly as an upstream returned it.
pub type RawRecord = serde_json::Value;

/// Lazily fetched pages of raw records.
pub type PageStream<'a> = BoxStream<'a, Result<Vec<RawRecord>>>;

/// Fee balance answer from the tracking system.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeeBalance {
    pub total_balance: Option<Decimal>,
    pub fees: Vec<RawRecord>,
    /// False when the tracking system exposes no fee endpoint at all.
    pub endpoint_found: bool,
}

/// Device-management directory.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    fn list_devices(&self, query: Option<String>, max_results: usize) -> PageStream<'_>;

    fn list_users(&self, max_results: usize) -> PageStream<'_>;

    async fn get_user(&self, email: &str) -> Result<Option<RawRecord>>;
}

/// Battery telemetry published alongside the directory.
pub trait TelemetryProvider: Send + Sync {
    fn list_battery_telemetry(&self) -> PageStream<'_>;
}

/// IT asset-tracking service.
#[async_trait]
pub trait AssetServiceProvider: Send + Sync {
    /// Full dump when `query` is empty.
    fn search_assets(&self, query: String, limit: usize) -> PageStream<'_>;

    async fn get_asset_by_tag(&self, asset_tag: &str) -> Result<Option<RawRecord>>;

    /// One page of users; `page` is zero-based.
    async fn get_users(&self, page: usize, page_size: usize) -> Result<Vec<RawRecord>>;

    async fn get_user_fees(&self, user_id: &str) -> Result<FeeBalance>;
}

/// Wireless location service.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn get_device_by_mac(&self, mac_address: &str) -> Result<Option<RawRecord>>;
}
