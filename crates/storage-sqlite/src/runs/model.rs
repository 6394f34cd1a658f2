use diesel::prelude::*;

use fleetsync_core::runs::{RunCategory, RunCounters, RunLog, RunStatus};
use fleetsync_core::Result;

use crate::text_columns::{enum_from_db, enum_to_db};

#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::run_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RunLogDB {
    pub id: i64,
    pub category: String,
    pub status: String,
    pub records_processed: i64,
    pub records_created: i64,
    pub records_updated: i64,
    pub duration_seconds: Option<i64>,
    pub error_message: Option<String>,
    pub details: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::run_logs)]
pub struct NewRunLogDB {
    pub category: String,
    pub status: String,
    pub started_at: String,
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::run_locks)]
#[diesel(primary_key(name))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RunLockDB {
    pub name: String,
    pub holder: String,
    pub acquired_at: String,
    pub expires_at: String,
}

impl RunLogDB {
    pub fn status(&self) -> Result<RunStatus> {
        enum_from_db(&self.status)
    }
}

impl NewRunLogDB {
    pub fn started(category: RunCategory, started_at: String) -> Result<Self> {
        Ok(Self {
            category: enum_to_db(&category)?,
            status: enum_to_db(&RunStatus::Started)?,
            started_at,
        })
    }
}

impl TryFrom<RunLogDB> for RunLog {
    type Error = fleetsync_core::Error;

    fn try_from(db: RunLogDB) -> Result<Self> {
        let details = match db.details.as_deref() {
            Some(text) if !text.trim().is_empty() => Some(serde_json::from_str::<RunCounters>(text)?),
            _ => None,
        };
        Ok(Self {
            id: db.id,
            category: enum_from_db(&db.category)?,
            status: enum_from_db(&db.status)?,
            records_processed: db.records_processed,
            records_created: db.records_created,
            records_updated: db.records_updated,
            duration_seconds: db.duration_seconds,
            error_message: db.error_message,
            details,
            started_at: db.started_at,
            completed_at: db.completed_at,
        })
    }
}
