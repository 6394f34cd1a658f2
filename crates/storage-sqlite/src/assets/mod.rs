//! SQLite persistence for tracked assets.

mod model;
mod repository;

pub use model::{AssetDB, AssetWriteDB};
pub use repository::AssetRepository;
