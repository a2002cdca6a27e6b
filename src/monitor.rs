//! Process-wide monitoring manager

use crate::cache::HealthCache;
use crate::config::{Config, ServiceConfig};
use crate::errors::{MonitorError, Result};
use crate::health::{Alert, OverallHealth, ServiceHealth};
use crate::probe::{HttpProbeClient, ProbeClient, ProbeExecutor};
use crate::registry::{ServiceInfo, ServiceRegistry};
use crate::scheduler::{ServiceTask, TickPipeline};
use crate::store::{HealthStore, JsonFileStore, MemoryStore};
use reqwest::Url;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

/// Tunables for a [`MonitoringManager`]
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Base for service URLs given as absolute paths
    pub base_url: Option<Url>,

    /// Upper bound on each persistence call
    pub store_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            store_timeout: Duration::from_millis(2000),
        }
    }
}

/// Owns the registry, the health cache and every service loop.
///
/// Built once at startup and shared by reference; there is no global instance.
pub struct MonitoringManager {
    registry: Mutex<ServiceRegistry>,
    cache: Arc<HealthCache>,
    store: Arc<dyn HealthStore>,
    pipeline: Arc<TickPipeline>,
    options: ManagerOptions,
    runtime: Handle,
    running: AtomicBool,
}

impl MonitoringManager {
    /// Create a manager with an empty registry.
    ///
    /// Must be called from within a tokio runtime; service loops are spawned onto it.
    pub fn new(
        client: Arc<dyn ProbeClient>,
        store: Arc<dyn HealthStore>,
        options: ManagerOptions,
    ) -> Self {
        let cache = Arc::new(HealthCache::new());
        let pipeline = Arc::new(TickPipeline::new(
            ProbeExecutor::new(client),
            Arc::clone(&cache),
            Arc::clone(&store),
            options.store_timeout,
        ));

        Self {
            registry: Mutex::new(ServiceRegistry::new()),
            cache,
            store,
            pipeline,
            options,
            runtime: Handle::current(),
            running: AtomicBool::new(false),
        }
    }

    /// Build the production manager: reqwest client, configured store and the
    /// configured service list, registered but not yet scheduled.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate().map_err(MonitorError::Config)?;

        let client = Arc::new(HttpProbeClient::new(&config.user_agent)?);

        let store: Arc<dyn HealthStore> = match &config.store_path {
            Some(path) => Arc::new(JsonFileStore::open(path).await?),
            None => Arc::new(MemoryStore::new()),
        };

        let options = ManagerOptions {
            base_url: Some(config.base_url()?),
            store_timeout: config.store_timeout,
        };

        let manager = Self::new(client, store, options);
        for service in config.load_services()? {
            manager.register_service(service).await?;
        }

        Ok(manager)
    }

    /// Register a service without scheduling it; `start_monitoring` picks it up
    pub async fn register_service(&self, config: ServiceConfig) -> Result<()> {
        let config = config.resolve(self.options.base_url.as_ref())?;
        let mut registry = self.registry.lock().await;
        let entry = registry.insert(config)?;
        debug!("Registered service {} ({})", entry.config.service, entry.config.url);
        Ok(())
    }

    /// Schedule every enabled service that is not already running. Idempotent.
    #[instrument(skip(self))]
    pub async fn start_monitoring(&self) {
        let mut registry = self.registry.lock().await;
        let mut scheduled = 0;

        for entry in registry.iter_mut() {
            if entry.config.enabled && !entry.is_scheduled() {
                let task = ServiceTask::spawn(
                    &self.runtime,
                    entry.config.clone(),
                    Arc::clone(&self.pipeline),
                );
                entry.attach(task);
                scheduled += 1;
            }
        }

        let was_running = self.running.swap(true, Ordering::SeqCst);
        if was_running && scheduled == 0 {
            debug!("Monitoring already running");
            return;
        }

        info!(
            services_count = registry.len(),
            scheduled, "Service health monitoring started"
        );
    }

    /// Cancel every service loop. Idempotent.
    ///
    /// Cached snapshots stay readable; results of probes still in flight are dropped.
    #[instrument(skip(self))]
    pub async fn stop_monitoring(&self) {
        let mut registry = self.registry.lock().await;
        let mut cancelled = 0;

        for entry in registry.iter_mut() {
            if let Some(task) = entry.take_task() {
                task.cancel().await;
                cancelled += 1;
            }
        }

        let was_running = self.running.swap(false, Ordering::SeqCst);
        if !was_running && cancelled == 0 {
            debug!("Monitoring already stopped");
            return;
        }

        info!(cancelled, "Service health monitoring stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Validate and register a service; enabled services are probed right away
    #[instrument(skip(self, config), fields(service = %config.service))]
    pub async fn add_service(&self, config: ServiceConfig) -> Result<()> {
        let config = config.resolve(self.options.base_url.as_ref())?;

        let mut registry = self.registry.lock().await;
        let entry = registry.insert(config)?;

        if entry.config.enabled {
            let task = ServiceTask::spawn(
                &self.runtime,
                entry.config.clone(),
                Arc::clone(&self.pipeline),
            );
            entry.attach(task);
        }

        info!(
            url = %entry.config.url,
            enabled = entry.config.enabled,
            "Service added to monitoring"
        );
        Ok(())
    }

    /// Cancel a service's loop and forget its health
    #[instrument(skip(self))]
    pub async fn remove_service(&self, service: &str) -> Result<()> {
        let mut registry = self.registry.lock().await;
        let mut entry = registry
            .remove(service)
            .ok_or_else(|| MonitorError::ServiceNotFound(service.to_string()))?;

        if let Some(task) = entry.take_task() {
            task.cancel().await;
        }
        // Evict while still holding the registry so a re-add cannot interleave
        self.cache.remove(service).await;

        info!("Service removed from monitoring");
        Ok(())
    }

    pub async fn list_services(&self) -> Vec<ServiceInfo> {
        self.registry.lock().await.list()
    }

    pub async fn get_service_health(&self, service: &str) -> Option<ServiceHealth> {
        self.cache.get(service).await
    }

    pub async fn get_all_services_health(&self) -> Vec<ServiceHealth> {
        self.cache.get_all().await
    }

    pub async fn get_overall_health(&self) -> OverallHealth {
        OverallHealth::from_services(self.cache.get_all().await)
    }

    /// Unresolved alerts, newest first. Store failures yield an empty list.
    pub async fn get_active_alerts(&self) -> Vec<Alert> {
        match timeout(self.options.store_timeout, self.store.list_active_alerts()).await {
            Ok(Ok(alerts)) => alerts,
            Ok(Err(e)) => {
                error!("Failed to load active alerts: {}", e);
                Vec::new()
            }
            Err(_) => {
                error!(
                    "Loading active alerts timed out after {}ms",
                    self.options.store_timeout.as_millis()
                );
                Vec::new()
            }
        }
    }

    /// Mark an alert as resolved. Recovery never resolves alerts on its own.
    #[instrument(skip(self))]
    pub async fn resolve_alert(&self, id: &str) -> Result<Alert> {
        let alert = timeout(self.options.store_timeout, self.store.resolve_alert(id))
            .await
            .map_err(|_| MonitorError::Timeout(format!("resolving alert {}", id)))??;

        info!(service = %alert.service, "Alert resolved");
        Ok(alert)
    }
}
