use std::collections::HashMap;

use crate::errors::Result;
use crate::upsert::UpsertStore;

use super::{DeviceFilter, DeviceRecord};

/// Persistence contract for merged device rows.
///
/// Batched writes come from [`UpsertStore`]; everything here is a read.
pub trait DeviceRepositoryTrait: UpsertStore<DeviceRecord> {
    fn find_by_serial(&self, serial_number: &str) -> Result<Option<DeviceRecord>>;

    fn find_by_asset_tag(&self, asset_tag: &str) -> Result<Option<DeviceRecord>>;

    fn list(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>>;

    /// Devices whose annotated user matches the (lower-cased) email.
    fn list_for_user(&self, email: &str) -> Result<Vec<DeviceRecord>>;

    /// Map of lower-cased annotated user email to the device ids assigned to it.
    fn assignments_by_user(&self) -> Result<HashMap<String, Vec<String>>>;
}
