//! Database models for people.
//!
//! The fee balance is kept as decimal text so no precision is lost between
//! runs.

use std::str::FromStr;

use diesel::prelude::*;
use rust_decimal::Decimal;

use fleetsync_core::people::{PersonDataSource, PersonRecord};
use fleetsync_core::Result;

use crate::text_columns::{enum_from_db, enum_to_db, list_from_db, list_to_db};

#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(primary_key(email))]
#[diesel(table_name = crate::schema::people)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PersonDB {
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
    pub assigned_devices: String,
    pub total_fee_balance: String,
    pub has_outstanding_fees: bool,
    pub fee_last_synced_at: Option<String>,
    pub data_source: String,
    pub is_merged: bool,
    pub directory_synced_at: Option<String>,
    pub tracking_synced_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::people)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PersonWriteDB {
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
    pub assigned_devices: String,
    pub total_fee_balance: String,
    pub has_outstanding_fees: bool,
    pub fee_last_synced_at: Option<String>,
    pub data_source: String,
    pub is_merged: bool,
    pub directory_synced_at: Option<String>,
    pub tracking_synced_at: Option<String>,
}

fn decimal_from_db(value: &str) -> Decimal {
    Decimal::from_str(value.trim()).unwrap_or_default()
}

impl From<PersonDB> for PersonRecord {
    fn from(db: PersonDB) -> Self {
        Self {
            total_fee_balance: decimal_from_db(&db.total_fee_balance),
            assigned_devices: list_from_db(&db.assigned_devices),
            data_source: enum_from_db::<PersonDataSource>(&db.data_source).unwrap_or_default(),
            email: db.email,
            directory_user_id: db.directory_user_id,
            tracking_user_id: db.tracking_user_id,
            full_name: db.full_name,
            first_name: db.first_name,
            last_name: db.last_name,
            org_unit_path: db.org_unit_path,
            is_admin: db.is_admin,
            is_suspended: db.is_suspended,
            last_login: db.last_login,
            student_id: db.student_id,
            student_grade: db.student_grade,
            tracking_location: db.tracking_location,
            tracking_role: db.tracking_role,
            tracking_username: db.tracking_username,
            tracking_active: db.tracking_active,
            device_count: db.device_count,
            has_outstanding_fees: db.has_outstanding_fees,
            fee_last_synced_at: db.fee_last_synced_at,
            is_merged: db.is_merged,
            directory_synced_at: db.directory_synced_at,
            tracking_synced_at: db.tracking_synced_at,
            created_at: Some(db.created_at),
            updated_at: Some(db.updated_at),
        }
    }
}

impl PersonWriteDB {
    pub fn from_record(record: PersonRecord) -> Result<Self> {
        Ok(Self {
            assigned_devices: list_to_db(&record.assigned_devices)?,
            data_source: enum_to_db(&record.data_source)?,
            total_fee_balance: record.total_fee_balance.round_dp(2).to_string(),
            email: record.email,
            directory_user_id: record.directory_user_id,
            tracking_user_id: record.tracking_user_id,
            full_name: record.full_name,
            first_name: record.first_name,
            last_name: record.last_name,
            org_unit_path: record.org_unit_path,
            is_admin: record.is_admin,
            is_suspended: record.is_suspended,
            last_login: record.last_login,
            student_id: record.student_id,
            student_grade: record.student_grade,
            tracking_location: record.tracking_location,
            tracking_role: record.tracking_role,
            tracking_username: record.tracking_username,
            tracking_active: record.tracking_active,
            device_count: record.device_count,
            has_outstanding_fees: record.has_outstanding_fees,
            fee_last_synced_at: record.fee_last_synced_at,
            is_merged: record.is_merged,
            directory_synced_at: record.directory_synced_at,
            tracking_synced_at: record.tracking_synced_at,
        })
    }
}
