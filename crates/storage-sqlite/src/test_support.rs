use std::sync::Arc;

use tempfile::tempdir;

use crate::db::{self, DbPool, WriteHandle};

/// Fresh migrated database in its own temp directory.
pub(crate) fn setup_db() -> (Arc<DbPool>, WriteHandle) {
    let dir = tempdir().expect("tempdir").keep();
    let db_path = db::init(dir.to_str().expect("utf-8 path")).expect("init db");
    db::run_migrations(&db_path).expect("migrations");
    let pool = db::create_pool(&db_path).expect("pool");
    let writer = db::spawn_writer(pool.as_ref().clone());
    (pool, writer)
}
