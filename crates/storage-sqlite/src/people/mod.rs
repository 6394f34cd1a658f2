//! SQLite persistence for merged people and their fee balances.

mod model;
mod repository;

pub use model::{PersonDB, PersonWriteDB};
pub use repository::PersonRepository;
