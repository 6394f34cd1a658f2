//! Source-priority merge rules.
//!
//! Each function takes the currently stored row (if any) plus this run's
//! normalized source records and returns the row to store. Bookkeeping
//! timestamps owned by the database (`created_at`, `updated_at`) are carried
//! over untouched.

mod device_merge;
mod person_merge;

pub use device_merge::{merge_device, DeviceSources};
pub use person_merge::{merge_person, PersonSources};

use crate::assets::{AssetRecord, NormalizedAsset};
use crate::identity::device_join_key;

/// Builds the stored asset row. The asset service owns every attribute.
pub fn merge_asset(existing: Option<&AssetRecord>, asset: NormalizedAsset, synced_at: &str) -> AssetRecord {
    AssetRecord {
        serial_number: device_join_key(asset.serial_number.as_deref()),
        asset_id: asset.asset_id,
        asset_tag: asset.asset_tag,
        device_type: asset.device_type,
        is_target_type: asset.is_target_type,
        model: asset.model,
        status: asset.status,
        owner_name: asset.owner_name,
        owner_email: asset.owner_email,
        owner_student_id: asset.owner_student_id,
        owner_grade: asset.owner_grade,
        location: asset.location,
        room: asset.room,
        notes: asset.notes,
        last_synced_at: Some(synced_at.to_string()),
        created_at: existing.and_then(|row| row.created_at.clone()),
        updated_at: existing.and_then(|row| row.updated_at.clone()),
    }
}

/// Picks the first value that is present and not blank.
pub(crate) fn first_present(candidates: &[Option<&String>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .map(|value| value.to_string())
}
