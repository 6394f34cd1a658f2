//! Read-through cache contract and key scheme.
//!
//! The pipeline never writes merge results into the cache; it only clears the
//! namespaces a run may have made stale.

mod memory_cache;

pub use memory_cache::{CacheStats, MemoryCache};

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::Result;

/// JSON value store with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    /// Removes every key starting with `prefix`; returns how many were removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize>;
}

/// Namespaced `entity:dimension:identifier` keys.
pub struct CacheKeys;

impl CacheKeys {
    /// Last finished run summary.
    pub const SYNC_STATUS: &'static str = "sync:status";

    /// Namespaces cleared after every successful run.
    pub const INVALIDATED_PREFIXES: [&'static str; 4] = ["device:", "person:", "list:", "report:"];

    pub fn device_by_serial(serial: &str) -> String {
        format!("device:serial:{}", serial.trim().to_uppercase())
    }

    /// Asset tags match exactly, so the tag is only trimmed.
    pub fn device_by_tag(tag: &str) -> String {
        format!("device:tag:{}", tag.trim())
    }

    pub fn person_by_email(email: &str) -> String {
        format!("person:email:{}", email.trim().to_lowercase())
    }

    pub fn device_list(fingerprint: &str) -> String {
        format!("list:devices:{}", fingerprint)
    }

    pub fn person_list(fingerprint: &str) -> String {
        format!("list:people:{}", fingerprint)
    }

    pub const REPORT_SUMMARY: &'static str = "report:summary";

    pub const REPORT_AUE_STATUS: &'static str = "report:aue_status";

    pub const REPORT_GHOST_DEVICES: &'static str = "report:ghost";

    pub fn report_battery_health(threshold: i32) -> String {
        format!("report:battery_health:{}", threshold)
    }

    pub fn report_aue_year(year: i32) -> String {
        format!("report:aue_year:{}", year)
    }
}
