use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;

use fleetsync_core::people::{
    FeeCandidate, FeeUpdate, PersonFilter, PersonRecord, PersonRepositoryTrait,
};
use fleetsync_core::upsert::{UpsertBatch, UpsertStore};
use fleetsync_core::Result;

use super::model::{PersonDB, PersonWriteDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::people;
use crate::text_columns::enum_to_db;
use crate::SQLITE_IN_CHUNK;

pub struct PersonRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl PersonRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        PersonRepository { pool, writer }
    }
}

#[async_trait]
impl UpsertStore<PersonRecord> for PersonRepository {
    fn load_existing(&self, keys: &[String]) -> Result<HashMap<String, PersonRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let mut found = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(SQLITE_IN_CHUNK) {
            let rows = people::table
                .filter(people::email.eq_any(chunk))
                .select(PersonDB::as_select())
                .load::<PersonDB>(&mut conn)
                .map_err(StorageError::from)?;
            for row in rows {
                found.insert(row.email.clone(), PersonRecord::from(row));
            }
        }
        Ok(found)
    }

    async fn commit_batch(&self, batch: UpsertBatch<PersonRecord>) -> Result<()> {
        let rows = batch
            .inserts
            .into_iter()
            .chain(batch.updates)
            .map(PersonWriteDB::from_record)
            .collect::<Result<Vec<_>>>()?;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                for row in &rows {
                    diesel::insert_into(people::table)
                        .values(row)
                        .on_conflict(people::email)
                        .do_update()
                        .set(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                debug!("[Storage] committed {} person rows", rows.len());
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl PersonRepositoryTrait for PersonRepository {
    fn find_by_email(&self, email: &str) -> Result<Option<PersonRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let row = people::table
            .find(email.trim().to_lowercase())
            .select(PersonDB::as_select())
            .first::<PersonDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(PersonRecord::from))
    }

    fn list(&self, filter: &PersonFilter) -> Result<Vec<PersonRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = people::table.into_boxed();
        if let Some(source) = filter.data_source {
            query = query.filter(people::data_source.eq(enum_to_db(&source)?));
        }
        if let Some(outstanding) = filter.has_outstanding_fees {
            query = query.filter(people::has_outstanding_fees.eq(outstanding));
        }
        if let Some(prefix) = filter.org_unit_prefix.as_deref() {
            query = query.filter(people::org_unit_path.like(format!("{}%", prefix)));
        }
        if filter.limit > 0 {
            query = query.limit(filter.limit).offset(filter.offset.max(0));
        }
        let rows = query
            .order(people::email.asc())
            .select(PersonDB::as_select())
            .load::<PersonDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(PersonRecord::from).collect())
    }

    fn fee_candidates(&self) -> Result<Vec<FeeCandidate>> {
        let mut conn = get_connection(&self.pool)?;
        let pairs = people::table
            .filter(people::tracking_user_id.is_not_null())
            .order(people::email.asc())
            .select((people::email, people::tracking_user_id))
            .load::<(String, Option<String>)>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(pairs
            .into_iter()
            .filter_map(|(email, tracking_user_id)| {
                tracking_user_id
                    .filter(|id| !id.trim().is_empty())
                    .map(|tracking_user_id| FeeCandidate {
                        email,
                        tracking_user_id,
                    })
            })
            .collect())
    }

    async fn apply_fee_updates(&self, updates: Vec<FeeUpdate>) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut affected = 0;
                for update in &updates {
                    affected += diesel::update(people::table.find(update.email.as_str()))
                        .set((
                            people::total_fee_balance
                                .eq(update.total_fee_balance.round_dp(2).to_string()),
                            people::has_outstanding_fees.eq(update.has_outstanding_fees),
                            people::fee_last_synced_at.eq(Some(update.fee_last_synced_at.clone())),
                        ))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                debug!("[Storage] applied {} fee balances", affected);
                Ok(affected)
            })
            .await
    }
}
