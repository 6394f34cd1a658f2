use diesel::prelude::*;

use fleetsync_core::assets::AssetRecord;

#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(primary_key(asset_id))]
#[diesel(table_name = crate::schema::assets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AssetDB {
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
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::assets)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AssetWriteDB {
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
}

impl From<AssetDB> for AssetRecord {
    fn from(db: AssetDB) -> Self {
        Self {
            asset_id: db.asset_id,
            asset_tag: db.asset_tag,
            serial_number: db.serial_number,
            device_type: db.device_type,
            is_target_type: db.is_target_type,
            model: db.model,
            status: db.status,
            owner_name: db.owner_name,
            owner_email: db.owner_email,
            owner_student_id: db.owner_student_id,
            owner_grade: db.owner_grade,
            location: db.location,
            room: db.room,
            notes: db.notes,
            last_synced_at: db.last_synced_at,
            created_at: Some(db.created_at),
            updated_at: Some(db.updated_at),
        }
    }
}

impl From<AssetRecord> for AssetWriteDB {
    fn from(record: AssetRecord) -> Self {
        Self {
            asset_id: record.asset_id,
            asset_tag: record.asset_tag,
            serial_number: record.serial_number,
            device_type: record.device_type,
            is_target_type: record.is_target_type,
            model: record.model,
            status: record.status,
            owner_name: record.owner_name,
            owner_email: record.owner_email,
            owner_student_id: record.owner_student_id,
            owner_grade: record.owner_grade,
            location: record.location,
            room: record.room,
            notes: record.notes,
            last_synced_at: record.last_synced_at,
        }
    }
}
