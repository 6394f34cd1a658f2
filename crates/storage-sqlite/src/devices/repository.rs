use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;

use fleetsync_core::devices::{DeviceFilter, DeviceRecord, DeviceRepositoryTrait};
use fleetsync_core::upsert::{UpsertBatch, UpsertStore};
use fleetsync_core::Result;

use super::model::{DeviceDB, DeviceWriteDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::devices;
use crate::text_columns::enum_to_db;
use crate::{lower, SQLITE_IN_CHUNK};

pub struct DeviceRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl DeviceRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        DeviceRepository { pool, writer }
    }
}

#[async_trait]
impl UpsertStore<DeviceRecord> for DeviceRepository {
    fn load_existing(&self, keys: &[String]) -> Result<HashMap<String, DeviceRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let mut found = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(SQLITE_IN_CHUNK) {
            let rows = devices::table
                .filter(devices::device_id.eq_any(chunk))
                .select(DeviceDB::as_select())
                .load::<DeviceDB>(&mut conn)
                .map_err(StorageError::from)?;
            for row in rows {
                found.insert(row.device_id.clone(), DeviceRecord::from(row));
            }
        }
        Ok(found)
    }

    async fn commit_batch(&self, batch: UpsertBatch<DeviceRecord>) -> Result<()> {
        let rows = batch
            .inserts
            .into_iter()
            .chain(batch.updates)
            .map(DeviceWriteDB::from_record)
            .collect::<Result<Vec<_>>>()?;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                for row in &rows {
                    diesel::insert_into(devices::table)
                        .values(row)
                        .on_conflict(devices::device_id)
                        .do_update()
                        .set(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                debug!("[Storage] committed {} device rows", rows.len());
                Ok(())
            })
            .await
    }
}

impl DeviceRepositoryTrait for DeviceRepository {
    fn find_by_serial(&self, serial_number: &str) -> Result<Option<DeviceRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let row = devices::table
            .filter(devices::serial_number.eq(serial_number.trim().to_uppercase()))
            .select(DeviceDB::as_select())
            .first::<DeviceDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(DeviceRecord::from))
    }

    /// Matches the directory asset tag or the tracking system's tag.
    fn find_by_asset_tag(&self, asset_tag: &str) -> Result<Option<DeviceRecord>> {
        let tag = asset_tag.trim().to_string();
        let mut conn = get_connection(&self.pool)?;
        let row = devices::table
            .filter(
                devices::asset_tag
                    .eq(tag.clone())
                    .or(devices::tracking_asset_tag.eq(tag)),
            )
            .select(DeviceDB::as_select())
            .first::<DeviceDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(DeviceRecord::from))
    }

    fn list(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = devices::table.into_boxed();
        if let Some(status) = filter.status {
            query = query.filter(devices::status.eq(enum_to_db(&status)?));
        }
        if let Some(prefix) = filter.org_unit_prefix.as_deref() {
            query = query.filter(devices::org_unit_path.like(format!("{}%", prefix)));
        }
        if let Some(tracking_status) = filter.tracking_status.as_deref() {
            query = query.filter(devices::tracking_status.eq(tracking_status.to_string()));
        }
        if filter.limit > 0 {
            query = query.limit(filter.limit).offset(filter.offset.max(0));
        }
        let rows = query
            .order(devices::device_id.asc())
            .select(DeviceDB::as_select())
            .load::<DeviceDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(DeviceRecord::from).collect())
    }

    fn list_for_user(&self, email: &str) -> Result<Vec<DeviceRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = devices::table
            .filter(lower(devices::annotated_user).eq(email.trim().to_lowercase()))
            .order(devices::device_id.asc())
            .select(DeviceDB::as_select())
            .load::<DeviceDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(DeviceRecord::from).collect())
    }

    fn assignments_by_user(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut conn = get_connection(&self.pool)?;
        let pairs = devices::table
            .filter(devices::annotated_user.is_not_null())
            .order(devices::device_id.asc())
            .select((devices::annotated_user, devices::device_id))
            .load::<(Option<String>, String)>(&mut conn)
            .map_err(StorageError::from)?;

        let mut assignments: HashMap<String, Vec<String>> = HashMap::new();
        for (user, device_id) in pairs {
            if let Some(user) = user.map(|u| u.trim().to_lowercase()).filter(|u| !u.is_empty()) {
                assignments.entry(user).or_default().push(device_id);
            }
        }
        Ok(assignments)
    }
}
