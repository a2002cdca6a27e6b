//! Per-service tick loops

use crate::alerts::AlertEngine;
use crate::cache::HealthCache;
use crate::config::ServiceConfig;
use crate::errors::Result;
use crate::health::{Alert, AlertType, HealthStatus, ServiceHealth};
use crate::probe::ProbeExecutor;
use crate::store::HealthStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Everything one tick touches after the probe: cache, alert rules and persistence
pub struct TickPipeline {
    executor: ProbeExecutor,
    cache: Arc<HealthCache>,
    alerts: AlertEngine,
    store: Arc<dyn HealthStore>,
    store_timeout: Duration,
}

/// Result of routing one probe through the cache and the alert rules
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub previous: Option<HealthStatus>,
    pub health: ServiceHealth,
    pub alert: Option<Alert>,
}

impl TickPipeline {
    pub fn new(
        executor: ProbeExecutor,
        cache: Arc<HealthCache>,
        store: Arc<dyn HealthStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            cache,
            alerts: AlertEngine::new(),
            store,
            store_timeout,
        }
    }

    /// Swap the snapshot into the cache and compare it with the one it replaced
    pub async fn record(&self, health: ServiceHealth) -> TickOutcome {
        let previous = self.cache.update(health.clone()).await;
        let alert = self.alerts.evaluate(&health.service, previous.as_ref(), &health);

        TickOutcome {
            previous: previous.map(|p| p.status),
            health,
            alert,
        }
    }

    /// Write the alert (if any) and the snapshot. Failures are logged; the cache stays
    /// authoritative for reads either way.
    pub async fn persist(&self, outcome: &TickOutcome) {
        let service = &outcome.health.service;

        if let Some(alert) = &outcome.alert {
            log_alert(alert, outcome);
            self.bounded("create_alert", service, self.store.create_alert(alert))
                .await;
        }

        self.bounded("upsert_health", service, self.store.upsert_health(&outcome.health))
            .await;
    }

    async fn bounded<F>(&self, operation: &str, service: &str, write: F)
    where
        F: Future<Output = Result<()>>,
    {
        match timeout(self.store_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(service = %service, operation, "Failed to persist monitor state: {}", e);
            }
            Err(_) => {
                error!(
                    service = %service,
                    operation,
                    "Persistence write abandoned after {}ms",
                    self.store_timeout.as_millis()
                );
            }
        }
    }
}

fn log_alert(alert: &Alert, outcome: &TickOutcome) {
    let previous = outcome.previous.map(|s| s.as_str()).unwrap_or("unknown");
    let response_time_ms = outcome.health.response_time.as_millis() as u64;
    let error = outcome.health.error.as_deref().unwrap_or("");

    if alert.alert_type == AlertType::Recovered {
        info!(
            service = %alert.service,
            previous_status = previous,
            current_status = %outcome.health.status,
            response_time_ms,
            severity = %alert.severity,
            "{}",
            alert.message
        );
    } else {
        warn!(
            service = %alert.service,
            previous_status = previous,
            current_status = %outcome.health.status,
            response_time_ms,
            error,
            severity = %alert.severity,
            "{}",
            alert.message
        );
    }
}

/// Handle to one service's running loop
#[derive(Debug)]
pub struct ServiceTask {
    gate: Arc<RwLock<bool>>,
    handle: JoinHandle<()>,
}

impl ServiceTask {
    /// Start the loop: probe immediately, then once per `config.interval`
    pub fn spawn(runtime: &Handle, config: ServiceConfig, pipeline: Arc<TickPipeline>) -> Self {
        let gate = Arc::new(RwLock::new(true));
        let handle = runtime.spawn(run_service_loop(config, pipeline, Arc::clone(&gate)));

        Self { gate, handle }
    }

    /// Stop the loop and wait until it is gone.
    ///
    /// A tick whose result already reached the cache is allowed to finish its alert and
    /// persistence writes (each bounded by the store timeout). A probe still in flight is
    /// dropped along with its result. Once this returns no request or write from this loop
    /// is outstanding, so a new loop for the same service can start immediately.
    pub async fn cancel(self) {
        *self.gate.write().await = false;
        self.handle.abort();

        match self.handle.await {
            Err(e) if !e.is_cancelled() => error!("Service loop ended abnormally: {}", e),
            _ => {}
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Self-rescheduling loop: the next sleep starts only after the whole tick (probe, cache,
/// alert, persistence) has completed, so ticks of one service never overlap.
async fn run_service_loop(config: ServiceConfig, pipeline: Arc<TickPipeline>, gate: Arc<RwLock<bool>>) {
    debug!(
        service = %config.service,
        "Scheduling {} {} every {}ms",
        config.method,
        config.url,
        config.interval.as_millis()
    );

    loop {
        let health = pipeline.executor.probe(&config).await;

        {
            // Held through persistence so cancellation waits for the tail of this tick
            let open = gate.read().await;
            if !*open {
                debug!(service = %config.service, "Discarding probe result after cancellation");
                break;
            }

            let outcome = pipeline.record(health).await;
            debug!(
                service = %config.service,
                status = %outcome.health.status,
                "Tick complete"
            );
            pipeline.persist(&outcome).await;
        }

        sleep(config.interval).await;
    }

    debug!(service = %config.service, "Service loop stopped");
}
