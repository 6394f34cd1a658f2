use std::collections::HashMap;

use crate::errors::Result;
use crate::upsert::UpsertStore;

use super::AssetRecord;

pub trait AssetRepositoryTrait: UpsertStore<AssetRecord> {
    /// Looks up assets by (already upper-cased) serial number.
    ///
    /// Returns a map keyed by the upper-cased serial. When several assets share
    /// a serial the most recently synced one wins.
    fn find_by_serials(&self, serials: &[String]) -> Result<HashMap<String, AssetRecord>>;

    fn find_by_tag(&self, asset_tag: &str) -> Result<Option<AssetRecord>>;

    fn count(&self) -> Result<i64>;
}
