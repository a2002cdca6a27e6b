//! Durable health and alert storage

use crate::errors::{MonitorError, Result};
use crate::health::{Alert, ServiceHealth};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Persistence seam for health history and alerts
#[async_trait]
pub trait HealthStore: Send + Sync {
    /// Insert or replace the stored snapshot for `health.service`
    async fn upsert_health(&self, health: &ServiceHealth) -> Result<()>;

    async fn create_alert(&self, alert: &Alert) -> Result<()>;

    /// Alerts without `resolved_at`, newest first
    async fn list_active_alerts(&self) -> Result<Vec<Alert>>;

    /// Stamp `resolved_at`; resolving twice keeps the first timestamp
    async fn resolve_alert(&self, id: &str) -> Result<Alert>;
}

/// Resolved alerts kept for history; older resolved alerts are dropped first
const MAX_RESOLVED_ALERTS: usize = 1000;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    health: BTreeMap<String, ServiceHealth>,
    #[serde(default)]
    alerts: Vec<Alert>,
    /// Position of each alert in `alerts`, keyed by id
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl StoreState {
    fn reindex(&mut self) {
        self.index = self
            .alerts
            .iter()
            .enumerate()
            .map(|(pos, alert)| (alert.id.clone(), pos))
            .collect();
    }

    fn upsert_health(&mut self, health: &ServiceHealth) {
        self.health.insert(health.service.clone(), health.clone());
    }

    fn create_alert(&mut self, alert: &Alert) -> Result<()> {
        if self.index.contains_key(&alert.id) {
            return Err(MonitorError::Store(format!("alert {} already exists", alert.id)));
        }
        self.index.insert(alert.id.clone(), self.alerts.len());
        self.alerts.push(alert.clone());
        Ok(())
    }

    fn active_alerts(&self) -> Vec<Alert> {
        // Reverse first so equal timestamps still list the later insert first
        let mut active: Vec<Alert> = self
            .alerts
            .iter()
            .rev()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        active
    }

    fn resolve_alert(&mut self, id: &str) -> Result<Alert> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| MonitorError::AlertNotFound(id.to_string()))?;

        let alert = &mut self.alerts[pos];
        if alert.resolved_at.is_some() {
            return Ok(alert.clone());
        }
        alert.resolved_at = Some(Utc::now());
        let resolved = alert.clone();

        self.prune_resolved();
        Ok(resolved)
    }

    /// Drop the oldest resolved alerts beyond the retention limit. Active alerts are
    /// never dropped.
    fn prune_resolved(&mut self) {
        let resolved = self.alerts.iter().filter(|a| !a.is_active()).count();
        if resolved <= MAX_RESOLVED_ALERTS {
            return;
        }

        let mut excess = resolved - MAX_RESOLVED_ALERTS;
        self.alerts.retain(|a| {
            if excess > 0 && !a.is_active() {
                excess -= 1;
                false
            } else {
                true
            }
        });
        self.reindex();
        debug!("Pruned resolved alerts, {} retained", self.alerts.len());
    }
}

/// Process-local store; contents are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last persisted snapshot for a service
    pub async fn stored_health(&self, service: &str) -> Option<ServiceHealth> {
        self.state.read().await.health.get(service).cloned()
    }

    /// Every alert ever recorded, in creation order
    pub async fn all_alerts(&self) -> Vec<Alert> {
        self.state.read().await.alerts.clone()
    }
}

#[async_trait]
impl HealthStore for MemoryStore {
    async fn upsert_health(&self, health: &ServiceHealth) -> Result<()> {
        self.state.write().await.upsert_health(health);
        Ok(())
    }

    async fn create_alert(&self, alert: &Alert) -> Result<()> {
        self.state.write().await.create_alert(alert)
    }

    async fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self.state.read().await.active_alerts())
    }

    async fn resolve_alert(&self, id: &str) -> Result<Alert> {
        self.state.write().await.resolve_alert(id)
    }
}

/// Store backed by a single JSON document, rewritten on every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open `path`, loading existing state if the file is present
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read(&path).await {
            Ok(raw) => {
                let mut state: StoreState = serde_json::from_slice(&raw)?;
                state.reindex();
                info!(
                    "Loaded {} health snapshots and {} alerts from {}",
                    state.health.len(),
                    state.alerts.len(),
                    path.display()
                );
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(MonitorError::Io(e)),
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &StoreState) -> Result<()> {
        let raw = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Persisted monitor state to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl HealthStore for JsonFileStore {
    async fn upsert_health(&self, health: &ServiceHealth) -> Result<()> {
        let mut state = self.state.lock().await;
        state.upsert_health(health);
        self.persist(&state).await
    }

    async fn create_alert(&self, alert: &Alert) -> Result<()> {
        let mut state = self.state.lock().await;
        state.create_alert(alert)?;
        self.persist(&state).await
    }

    async fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self.state.lock().await.active_alerts())
    }

    async fn resolve_alert(&self, id: &str) -> Result<Alert> {
        let mut state = self.state.lock().await;
        let alert = state.resolve_alert(id)?;
        self.persist(&state).await?;
        Ok(alert)
    }
}
