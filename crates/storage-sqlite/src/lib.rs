//! SQLite storage for fleetsync.
//!
//! Reads go through a shared r2d2 pool. Every write is funnelled through the
//! single writer thread in [`db::write_actor`].

pub mod assets;
pub mod db;
pub mod devices;
pub mod errors;
pub mod people;
pub mod runs;
pub mod schema;
mod text_columns;

#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
pub(crate) mod test_support;

pub use assets::AssetRepository;
pub use db::{create_pool, get_connection, init, run_migrations, spawn_writer, DbPool, WriteHandle};
pub use devices::DeviceRepository;
pub use errors::StorageError;
pub use people::PersonRepository;
pub use runs::{RunLockRepository, RunLogRepository};

/// Keeps `IN (...)` lists well under SQLite's bound-parameter limit.
pub(crate) const SQLITE_IN_CHUNK: usize = 500;

diesel::define_sql_function! {
    fn lower(x: diesel::sql_types::Nullable<diesel::sql_types::Text>) -> diesel::sql_types::Nullable<diesel::sql_types::Text>;
}
