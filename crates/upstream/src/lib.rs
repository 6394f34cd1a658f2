//! HTTP adapters for the three upstream systems.
//!
//! Each client implements the matching provider trait from
//! `fleetsync_core::upstream` and shares one retrying JSON transport.

pub mod asset_service;
pub mod directory;
pub mod error;
pub mod http;
pub mod location;
pub mod paging;

#[cfg(test)]
mod test_server;

pub use asset_service::{AssetServiceClient, AssetServiceConfig};
pub use directory::{DirectoryClient, DirectoryConfig};
pub use error::{ApiRetryClass, Result, UpstreamError};
pub use http::{HttpTransport, RetryPolicy};
pub use location::{LocationClient, LocationConfig};
