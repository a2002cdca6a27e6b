//! In-memory store of the latest health snapshot per service

use crate::health::ServiceHealth;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Concurrency-safe map from service name to its current snapshot.
///
/// Each service has a single writer (its own tick loop), so the lock only has to keep
/// readers from interleaving with writes for other services.
#[derive(Debug, Default)]
pub struct HealthCache {
    entries: RwLock<HashMap<String, ServiceHealth>>,
}

impl HealthCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for `health.service`, returning the one it displaced
    pub async fn update(&self, health: ServiceHealth) -> Option<ServiceHealth> {
        let mut entries = self.entries.write().await;
        entries.insert(health.service.clone(), health)
    }

    pub async fn get(&self, service: &str) -> Option<ServiceHealth> {
        self.entries.read().await.get(service).cloned()
    }

    /// All snapshots, ordered by service name
    pub async fn get_all(&self) -> Vec<ServiceHealth> {
        let entries = self.entries.read().await;
        let mut all: Vec<ServiceHealth> = entries.values().cloned().collect();
        all.sort_by(|a, b| a.service.cmp(&b.service));
        all
    }

    pub async fn remove(&self, service: &str) -> Option<ServiceHealth> {
        let removed = self.entries.write().await.remove(service);
        if removed.is_some() {
            debug!("Evicted cached health for {}", service);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;
    use std::sync::Arc;
    use std::time::Duration;

    fn snapshot(service: &str, status: HealthStatus) -> ServiceHealth {
        ServiceHealth::new(service, status, Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_update_returns_previous() {
        let cache = HealthCache::new();

        let previous = cache.update(snapshot("database", HealthStatus::Healthy)).await;
        assert!(previous.is_none());

        let previous = cache.update(snapshot("database", HealthStatus::Down)).await;
        assert_eq!(previous.map(|h| h.status), Some(HealthStatus::Healthy));

        let current = cache.get("database").await.unwrap();
        assert_eq!(current.status, HealthStatus::Down);
        assert_eq!(cache.get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshots_are_replaced_not_merged() {
        let cache = HealthCache::new();

        cache
            .update(snapshot("email", HealthStatus::Degraded).with_error("HTTP 429").with_detail("statusCode", 429))
            .await;
        cache.update(snapshot("email", HealthStatus::Healthy)).await;

        let current = cache.get("email").await.unwrap();
        assert!(current.error.is_none());
        assert!(current.details.is_empty());
    }

    #[tokio::test]
    async fn test_get_all_and_remove() {
        let cache = HealthCache::new();
        cache.update(snapshot("sms", HealthStatus::Healthy)).await;
        cache.update(snapshot("database", HealthStatus::Healthy)).await;

        let names: Vec<String> = cache.get_all().await.into_iter().map(|h| h.service).collect();
        assert_eq!(names, vec!["database", "sms"]);

        assert!(cache.remove("sms").await.is_some());
        assert!(cache.remove("sms").await.is_none());
        assert!(cache.get("sms").await.is_none());
        assert_eq!(cache.get_all().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_for_distinct_services() {
        let cache = Arc::new(HealthCache::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let name = format!("service-{}", i);
                for _ in 0..50 {
                    cache.update(snapshot(&name, HealthStatus::Healthy)).await;
                    assert!(cache.get(&name).await.is_some());
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.get_all().await.len(), 16);
    }
}
