//! Fleetsync core: inventory reconciliation across the device directory, the
//! asset-tracking service and the wireless location service.
//!
//! Everything that touches the network or the database sits behind a trait;
//! the `fleetsync-upstream` and `fleetsync-storage-sqlite` crates provide the
//! production implementations.

pub mod assets;
pub mod cache;
pub mod constants;
pub mod devices;
pub mod errors;
pub mod extraction;
pub mod fees;
pub mod identity;
pub mod merge;
pub mod people;
pub mod queries;
pub mod resources;
pub mod runs;
pub mod sync;
pub mod upsert;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::{Error, Result};
