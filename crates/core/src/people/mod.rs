//! People module - directory accounts merged with tracking-system users.

mod people_model;
mod people_traits;

pub use people_model::*;
pub use people_traits::*;
