//! Service Health Monitor Library
//!
//! Polls the health endpoints of dependent services on independent schedules, keeps the
//! latest snapshot of each in memory, raises alerts on status transitions and persists
//! both through a pluggable store.

pub mod alerts;
pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod health;
pub mod monitor;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{Config, HttpMethod, ServiceConfig};
pub use errors::{MonitorError, Result};
pub use health::{Alert, AlertSeverity, AlertType, HealthStatus, HealthSummary, OverallHealth, ServiceHealth};
pub use monitor::{ManagerOptions, MonitoringManager};
pub use store::{HealthStore, JsonFileStore, MemoryStore};
