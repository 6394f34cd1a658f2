use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};

use fleetsync_core::errors::{DatabaseError, Error};
use fleetsync_core::runs::{RunCategory, RunCompletion, RunLog, RunLogRepositoryTrait, RunStatus};
use fleetsync_core::Result;

use super::model::{NewRunLogDB, RunLogDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::run_logs;
use crate::text_columns::enum_to_db;

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct RunLogRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl RunLogRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        RunLogRepository { pool, writer }
    }
}

fn load_run(conn: &mut SqliteConnection, run_id: i64) -> Result<Option<RunLogDB>> {
    let row = run_logs::table
        .find(run_id)
        .select(RunLogDB::as_select())
        .first::<RunLogDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    Ok(row)
}

#[async_trait]
impl RunLogRepositoryTrait for RunLogRepository {
    async fn create_run(&self, category: RunCategory) -> Result<RunLog> {
        let new_row = NewRunLogDB::started(category, now_rfc3339())?;
        let row = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<RunLogDB> {
                let row = diesel::insert_into(run_logs::table)
                    .values(&new_row)
                    .returning(RunLogDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                Ok(row)
            })
            .await?;
        debug!("[Storage] created run {} ({})", row.id, category.as_str());
        RunLog::try_from(row)
    }

    async fn mark_running(&self, run_id: i64) -> Result<()> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let Some(row) = load_run(conn, run_id)? else {
                    return Err(Error::Database(DatabaseError::NotFound(format!(
                        "Run {} not found",
                        run_id
                    ))));
                };
                let current = row.status()?;
                if !current.can_transition_to(RunStatus::Running) {
                    warn!(
                        "[Storage] run {} is {:?}; not moving it to running",
                        run_id, current
                    );
                    return Ok(());
                }
                diesel::update(run_logs::table.find(run_id))
                    .set(run_logs::status.eq(enum_to_db(&RunStatus::Running)?))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn finish_run(&self, run_id: i64, completion: RunCompletion) -> Result<RunLog> {
        if !completion.status.is_terminal() {
            return Err(Error::Validation(format!(
                "Run {} cannot finish with non-terminal status {:?}",
                run_id, completion.status
            )));
        }
        let row = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<RunLogDB> {
                let Some(row) = load_run(conn, run_id)? else {
                    return Err(Error::Database(DatabaseError::NotFound(format!(
                        "Run {} not found",
                        run_id
                    ))));
                };
                let current = row.status()?;
                if !current.can_transition_to(completion.status) {
                    return Err(Error::Validation(format!(
                        "Run {} is already {:?}",
                        run_id, current
                    )));
                }
                let counters = &completion.counters;
                let updated = diesel::update(run_logs::table.find(run_id))
                    .set((
                        run_logs::status.eq(enum_to_db(&completion.status)?),
                        run_logs::records_processed.eq(counters.total_processed()),
                        run_logs::records_created.eq(counters.total_created()),
                        run_logs::records_updated.eq(counters.total_updated()),
                        run_logs::duration_seconds.eq(Some(completion.duration_seconds)),
                        run_logs::error_message.eq(completion.error_message.clone()),
                        run_logs::details.eq(Some(serde_json::to_string(counters)?)),
                        run_logs::completed_at.eq(Some(now_rfc3339())),
                    ))
                    .returning(RunLogDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                Ok(updated)
            })
            .await?;
        RunLog::try_from(row)
    }

    fn get_run(&self, run_id: i64) -> Result<Option<RunLog>> {
        let mut conn = get_connection(&self.pool)?;
        load_run(&mut conn, run_id)?.map(RunLog::try_from).transpose()
    }

    fn recent_runs(&self, limit: i64) -> Result<Vec<RunLog>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = run_logs::table
            .order(run_logs::id.desc())
            .limit(limit.max(1))
            .select(RunLogDB::as_select())
            .load::<RunLogDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(RunLog::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;
    use fleetsync_core::runs::RunCounters;

    fn completion(status: RunStatus) -> RunCompletion {
        let mut counters = RunCounters::default();
        counters.devices.processed = 3;
        counters.devices.created = 2;
        counters.devices.updated = 1;
        counters.people.processed = 4;
        RunCompletion {
            status,
            counters,
            duration_seconds: 7,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn run_moves_through_its_lifecycle() {
        let (pool, writer) = setup_db();
        let repo = RunLogRepository::new(pool, writer);

        let run = repo.create_run(RunCategory::Full).await.expect("create");
        assert_eq!(run.status, RunStatus::Started);
        assert!(run.completed_at.is_none());

        repo.mark_running(run.id).await.expect("running");
        let finished = repo
            .finish_run(run.id, completion(RunStatus::Completed))
            .await
            .expect("finish");

        assert_eq!(finished.status, RunStatus::Completed);
        assert_eq!(finished.records_processed, 7);
        assert_eq!(finished.records_created, 2);
        assert_eq!(finished.records_updated, 1);
        assert_eq!(finished.duration_seconds, Some(7));
        assert!(finished.completed_at.is_some());
        assert_eq!(finished.details.expect("details").devices.processed, 3);
    }

    #[tokio::test]
    async fn terminal_runs_do_not_move() {
        let (pool, writer) = setup_db();
        let repo = RunLogRepository::new(pool, writer);

        let run = repo.create_run(RunCategory::Assets).await.expect("create");
        let mut failed = completion(RunStatus::Failed);
        failed.error_message = Some("directory unavailable".to_string());
        repo.finish_run(run.id, failed).await.expect("fail");

        repo.mark_running(run.id).await.expect("ignored");
        assert!(repo
            .finish_run(run.id, completion(RunStatus::Completed))
            .await
            .is_err());

        let stored = repo.get_run(run.id).expect("get").expect("row");
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("directory unavailable"));
        assert!(repo.get_run(run.id + 100).expect("get").is_none());
    }

    #[tokio::test]
    async fn recent_runs_are_newest_first() {
        let (pool, writer) = setup_db();
        let repo = RunLogRepository::new(pool, writer);

        let first = repo.create_run(RunCategory::Full).await.expect("create");
        let second = repo.create_run(RunCategory::UsersOnly).await.expect("create");
        let third = repo.create_run(RunCategory::DevicesOnly).await.expect("create");

        let recent = repo.recent_runs(2).expect("recent");
        assert_eq!(
            recent.iter().map(|run| run.id).collect::<Vec<_>>(),
            vec![third.id, second.id]
        );
        assert!(recent.iter().all(|run| run.id != first.id));
        assert_eq!(recent[1].category, RunCategory::UsersOnly);
    }
}
