//! Tracked asset models.

use serde::{Deserialize, Serialize};

use crate::devices::TrackingFields;
use crate::upsert::Upsertable;

/// Category name the asset service uses for the managed device type.
pub const TARGET_DEVICE_CATEGORY: &str = "Chromebooks";

/// Asset as extracted from one asset-service record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAsset {
    pub asset_id: String,
    pub asset_tag: Option<String>,
    pub serial_number: Option<String>,
    pub device_type: Option<String>,
    pub is_target_type: bool,
    pub model: Option<String>,
    pub status: Option<String>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub owner_student_id: Option<String>,
    pub owner_grade: Option<String>,
    pub location: Option<String>,
    pub room: Option<String>,
    pub notes: Option<String>,
}

impl NormalizedAsset {
    pub fn tracking_fields(&self) -> TrackingFields {
        TrackingFields {
            asset_id: Some(self.asset_id.clone()),
            asset_tag: self.asset_tag.clone(),
            location: self.location.clone(),
            room: self.room.clone(),
            notes: self.notes.clone(),
            status: self.status.clone(),
            owner_name: self.owner_name.clone(),
            owner_email: self.owner_email.clone(),
        }
    }
}

/// Persisted asset row (any device type).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub asset_id: String,
    pub asset_tag: Option<String>,
    pub serial_number: Option<String>,
    pub device_type: Option<String>,
    pub is_target_type: bool,
    pub model: Option<String>,
    pub status: Option<String>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub owner_student_id: Option<String>,
    pub owner_grade: Option<String>,
    pub location: Option<String>,
    pub room: Option<String>,
    pub notes: Option<String>,
    pub last_synced_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl AssetRecord {
    /// Tracking fields used when the in-run index has no match for a device.
    pub fn tracking_fields(&self) -> TrackingFields {
        TrackingFields {
            asset_id: Some(self.asset_id.clone()),
            asset_tag: self.asset_tag.clone(),
            location: self.location.clone(),
            room: self.room.clone(),
            notes: self.notes.clone(),
            status: self.status.clone(),
            owner_name: self.owner_name.clone(),
            owner_email: self.owner_email.clone(),
        }
    }
}

impl Upsertable for AssetRecord {
    fn upsert_key(&self) -> String {
        self.asset_id.clone()
    }

    fn same_content(&self, other: &Self) -> bool {
        let strip = |record: &Self| Self {
            last_synced_at: None,
            created_at: None,
            updated_at: None,
            ..record.clone()
        };
        strip(self) == strip(other)
    }
}
