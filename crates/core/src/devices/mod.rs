//! Devices module - merged device inventory.

mod devices_model;
mod devices_traits;

pub use devices_model::*;
pub use devices_traits::*;
