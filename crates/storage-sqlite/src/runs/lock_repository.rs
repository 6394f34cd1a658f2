use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use log::{debug, info};

use fleetsync_core::runs::RunLockRepositoryTrait;
use fleetsync_core::Result;

use super::model::RunLockDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::run_locks;

/// Run lock rows. Expiry is compared in Rust so malformed timestamps count as
/// expired rather than wedging every future run.
pub struct RunLockRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl RunLockRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        RunLockRepository { pool, writer }
    }
}

fn is_live(lock: &RunLockDB, now: DateTime<Utc>) -> bool {
    DateTime::parse_from_rfc3339(&lock.expires_at)
        .map(|expires| expires.with_timezone(&Utc) > now)
        .unwrap_or(false)
}

fn load_lock(conn: &mut SqliteConnection, name: &str) -> Result<Option<RunLockDB>> {
    let row = run_locks::table
        .find(name)
        .select(RunLockDB::as_select())
        .first::<RunLockDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    Ok(row)
}

#[async_trait]
impl RunLockRepositoryTrait for RunLockRepository {
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let name = name.to_string();
        let holder = holder.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let now = Utc::now();
                if let Some(existing) = load_lock(conn, &name)? {
                    if is_live(&existing, now) {
                        debug!(
                            "[Storage] lock '{}' is held by {} until {}",
                            name, existing.holder, existing.expires_at
                        );
                        return Ok(false);
                    }
                    info!(
                        "[Storage] taking over expired lock '{}' from {}",
                        name, existing.holder
                    );
                }
                let row = RunLockDB {
                    name: name.clone(),
                    holder,
                    acquired_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                    expires_at: (now + ttl).to_rfc3339_opts(SecondsFormat::Millis, true),
                };
                diesel::insert_into(run_locks::table)
                    .values(&row)
                    .on_conflict(run_locks::name)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(true)
            })
            .await
    }

    async fn release(&self, name: &str, holder: &str) -> Result<bool> {
        let name = name.to_string();
        let holder = holder.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let removed = diesel::delete(
                    run_locks::table
                        .filter(run_locks::name.eq(&name))
                        .filter(run_locks::holder.eq(&holder)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(removed > 0)
            })
            .await
    }

    fn current_holder(&self, name: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        let lock = load_lock(&mut conn, name)?;
        Ok(lock
            .filter(|lock| is_live(lock, Utc::now()))
            .map(|lock| lock.holder))
    }
}
