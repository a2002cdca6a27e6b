//! Registry of monitored services and their running loops

use crate::config::ServiceConfig;
use crate::errors::{MonitorError, Result};
use crate::scheduler::ServiceTask;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// One registered service: its configuration plus the loop that probes it
#[derive(Debug)]
pub struct RegisteredService {
    pub config: ServiceConfig,
    pub registered_at: DateTime<Utc>,
    task: Option<ServiceTask>,
}

impl RegisteredService {
    fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            registered_at: Utc::now(),
            task: None,
        }
    }

    /// True while a loop is attached and has not exited
    pub fn is_scheduled(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn attach(&mut self, task: ServiceTask) {
        self.task = Some(task);
    }

    pub fn take_task(&mut self) -> Option<ServiceTask> {
        self.task.take()
    }

    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            config: self.config.clone(),
            registered_at: self.registered_at,
            scheduled: self.is_scheduled(),
        }
    }
}

/// Read-only view of a registered service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    #[serde(flatten)]
    pub config: ServiceConfig,
    pub registered_at: DateTime<Utc>,
    pub scheduled: bool,
}

/// Services keyed by name. Owns every loop handle, so lookup and cancellation are O(1).
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: HashMap<String, RegisteredService>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, config: ServiceConfig) -> Result<&mut RegisteredService> {
        if self.entries.contains_key(&config.service) {
            return Err(MonitorError::DuplicateService(config.service));
        }

        let name = config.service.clone();
        Ok(self
            .entries
            .entry(name)
            .or_insert_with(|| RegisteredService::new(config)))
    }

    pub fn remove(&mut self, service: &str) -> Option<RegisteredService> {
        self.entries.remove(service)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegisteredService> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered services, ordered by name
    pub fn list(&self) -> Vec<ServiceInfo> {
        let mut services: Vec<ServiceInfo> = self.entries.values().map(|e| e.info()).collect();
        services.sort_by(|a, b| a.config.service.cmp(&b.config.service));
        services
    }
}
