//! Cached read queries and reports over the merged store.

mod queries_model;
mod queries_reports;
mod queries_service;

pub use queries_model::{
    AueBucket, AueModelCount, AueStatusReport, AueYearReport, BatteryHealthReport, DeviceSummary,
    GhostDevice, GhostDeviceReport, OrgUnitCount, PersonDetail, StatusCount,
};
pub use queries_service::{QueryService, QueryServiceTrait};
