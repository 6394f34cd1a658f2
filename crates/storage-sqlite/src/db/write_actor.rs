//! Single-writer actor.
//!
//! SQLite allows one writer at a time, so every mutation is shipped to one
//! dedicated thread that owns a pooled connection. Each job runs inside its
//! own `IMMEDIATE` transaction: a job that returns an error leaves nothing
//! behind.

use std::any::Any;

use diesel::sqlite::SqliteConnection;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use fleetsync_core::errors::{DatabaseError, Error};
use fleetsync_core::Result;

use super::DbPool;
use crate::errors::StorageError;

type AnyResult = Result<Box<dyn Any + Send>>;
type Job = Box<dyn FnOnce(&mut SqliteConnection) -> AnyResult + Send>;

const QUEUE_DEPTH: usize = 256;

/// Error type threaded through diesel's transaction so both job failures and
/// commit failures roll back.
enum TxError {
    Job(Error),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Diesel(err)
    }
}

#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(Job, oneshot::Sender<AnyResult>)>,
}

impl WriteHandle {
    /// Runs `job` on the writer thread inside one transaction.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed: Job = Box::new(move |conn| job(conn).map(|value| Box::new(value) as Box<dyn Any + Send>));
        self.tx
            .send((boxed, reply_tx))
            .await
            .map_err(|_| StorageError::Writer("writer thread has stopped".to_string()))?;

        let result = reply_rx
            .await
            .map_err(|_| StorageError::Writer("writer dropped the reply".to_string()))??;
        result
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| Error::Database(DatabaseError::Internal("writer returned an unexpected type".to_string())))
    }
}

/// Starts the writer thread and returns the handle used to submit jobs.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<(Job, oneshot::Sender<AnyResult>)>(QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("fleetsync-writer".to_string())
        .spawn(move || {
            let mut conn = match pool.get() {
                Ok(conn) => conn,
                Err(err) => {
                    error!("[Storage] writer could not get a connection: {}", err);
                    return;
                }
            };
            while let Some((job, reply)) = rx.blocking_recv() {
                let outcome = conn.immediate_transaction::<_, TxError, _>(|tx_conn| job(tx_conn).map_err(TxError::Job));
                let result = match outcome {
                    Ok(value) => Ok(value),
                    Err(TxError::Job(err)) => Err(err),
                    Err(TxError::Diesel(err)) => Err(StorageError::from(err).into()),
                };
                if reply.send(result).is_err() {
                    debug!("[Storage] write caller went away before the reply");
                }
            }
            debug!("[Storage] writer queue closed");
        })
        .map(|_| ())
        .unwrap_or_else(|err| error!("[Storage] could not start writer thread: {}", err));

    WriteHandle { tx }
}
