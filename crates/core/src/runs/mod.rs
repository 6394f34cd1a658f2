//! Run log and run lock contracts.

mod run_model;
mod run_traits;

pub use run_model::*;
pub use run_traits::*;
