//! Assets module - every asset the tracking system knows about.

mod assets_model;
mod assets_traits;

pub use assets_model::*;
pub use assets_traits::*;
