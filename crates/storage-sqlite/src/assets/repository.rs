use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;

use fleetsync_core::assets::{AssetRecord, AssetRepositoryTrait};
use fleetsync_core::upsert::{UpsertBatch, UpsertStore};
use fleetsync_core::Result;

use super::model::{AssetDB, AssetWriteDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::assets;
use crate::SQLITE_IN_CHUNK;

pub struct AssetRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl AssetRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        AssetRepository { pool, writer }
    }
}

#[async_trait]
impl UpsertStore<AssetRecord> for AssetRepository {
    fn load_existing(&self, keys: &[String]) -> Result<HashMap<String, AssetRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let mut found = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(SQLITE_IN_CHUNK) {
            let rows = assets::table
                .filter(assets::asset_id.eq_any(chunk))
                .select(AssetDB::as_select())
                .load::<AssetDB>(&mut conn)
                .map_err(StorageError::from)?;
            for row in rows {
                found.insert(row.asset_id.clone(), AssetRecord::from(row));
            }
        }
        Ok(found)
    }

    async fn commit_batch(&self, batch: UpsertBatch<AssetRecord>) -> Result<()> {
        let rows: Vec<AssetWriteDB> = batch
            .inserts
            .into_iter()
            .chain(batch.updates)
            .map(AssetWriteDB::from)
            .collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                for row in &rows {
                    diesel::insert_into(assets::table)
                        .values(row)
                        .on_conflict(assets::asset_id)
                        .do_update()
                        .set(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                debug!("[Storage] committed {} asset rows", rows.len());
                Ok(())
            })
            .await
    }
}

impl AssetRepositoryTrait for AssetRepository {
    fn find_by_serials(&self, serials: &[String]) -> Result<HashMap<String, AssetRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let mut found: HashMap<String, AssetRecord> = HashMap::with_capacity(serials.len());
        for chunk in serials.chunks(SQLITE_IN_CHUNK) {
            // Oldest sync first so the latest row for a shared serial lands last.
            let rows = assets::table
                .filter(assets::serial_number.eq_any(chunk))
                .order((assets::last_synced_at.asc(), assets::asset_id.asc()))
                .select(AssetDB::as_select())
                .load::<AssetDB>(&mut conn)
                .map_err(StorageError::from)?;
            for row in rows {
                if let Some(serial) = row.serial_number.clone() {
                    found.insert(serial, AssetRecord::from(row));
                }
            }
        }
        Ok(found)
    }

    fn find_by_tag(&self, asset_tag: &str) -> Result<Option<AssetRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let row = assets::table
            .filter(assets::asset_tag.eq(asset_tag.trim()))
            .order(assets::last_synced_at.desc())
            .select(AssetDB::as_select())
            .first::<AssetDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(AssetRecord::from))
    }

    fn count(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let total = assets::table
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(total)
    }
}
