//! Person domain models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::upsert::Upsertable;

/// Which sources contributed to a person row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonDataSource {
    #[default]
    DirectoryOnly,
    TrackingOnly,
    Merged,
}

impl PersonDataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectoryOnly => "directory-only",
            Self::TrackingOnly => "tracking-only",
            Self::Merged => "merged",
        }
    }
}

/// Directory account after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryPerson {
    pub directory_user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub org_unit_path: Option<String>,
    pub is_admin: bool,
    pub is_suspended: bool,
    pub last_login: Option<String>,
    pub student_id: Option<String>,
    pub student_grade: Option<String>,
}

/// Tracking-system user after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingPerson {
    pub tracking_user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub location: Option<String>,
    pub role_name: Option<String>,
    pub student_id: Option<String>,
    pub grade: Option<String>,
    pub is_active: Option<bool>,
}

/// One real person, merged across the directory and the tracking system.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    /// Normalized (trimmed, lower-cased) email; the row identity.
    pub email: String,
    pub directory_user_id: Option<String>,
    pub tracking_user_id: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub org_unit_path: Option<String>,
    pub is_admin: bool,
    pub is_suspended: bool,
    pub last_login: Option<String>,
    pub student_id: Option<String>,
    pub student_grade: Option<String>,
    pub tracking_location: Option<String>,
    pub tracking_role: Option<String>,
    pub tracking_username: Option<String>,
    pub tracking_active: Option<bool>,
    pub device_count: i32,
    pub assigned_devices: Vec<String>,
    pub total_fee_balance: Decimal,
    pub has_outstanding_fees: bool,
    pub fee_last_synced_at: Option<String>,
    pub data_source: PersonDataSource,
    pub is_merged: bool,
    pub directory_synced_at: Option<String>,
    pub tracking_synced_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Upsertable for PersonRecord {
    fn upsert_key(&self) -> String {
        self.email.clone()
    }

    fn same_content(&self, other: &Self) -> bool {
        let strip = |record: &Self| Self {
            directory_synced_at: None,
            tracking_synced_at: None,
            created_at: None,
            updated_at: None,
            ..record.clone()
        };
        strip(self) == strip(other)
    }
}

/// Balance fetched for one person during the fee phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeUpdate {
    pub email: String,
    pub total_fee_balance: Decimal,
    pub has_outstanding_fees: bool,
    pub fee_last_synced_at: String,
}

/// Person eligible for a fee lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeCandidate {
    pub email: String,
    pub tracking_user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonFilter {
    pub data_source: Option<PersonDataSource>,
    pub has_outstanding_fees: Option<bool>,
    pub org_unit_prefix: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_uses_hyphenated_names() {
        let names = [
            PersonDataSource::DirectoryOnly,
            PersonDataSource::TrackingOnly,
            PersonDataSource::Merged,
        ]
        .iter()
        .map(|source| serde_json::to_string(source).expect("serialize"))
        .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["\"directory-only\"", "\"tracking-only\"", "\"merged\""]
        );
    }
}
