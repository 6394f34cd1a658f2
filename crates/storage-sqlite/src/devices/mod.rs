//! SQLite persistence for merged devices.

mod model;
mod repository;

pub use model::{DeviceDB, DeviceWriteDB};
pub use repository::DeviceRepository;
