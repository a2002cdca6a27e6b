//! Test doubles for the probe client and the store

use crate::config::HttpMethod;
use crate::errors::{MonitorError, Result};
use crate::health::{Alert, ServiceHealth};
use crate::probe::{ProbeClient, ProbeResponse};
use crate::store::{HealthStore, MemoryStore};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct ScriptedOutcome {
    delay: Duration,
    result: std::result::Result<u16, String>,
}

impl ScriptedOutcome {
    pub fn status(code: u16, delay: Duration) -> Self {
        Self {
            delay,
            result: Ok(code),
        }
    }

    pub fn failure(reason: &str, delay: Duration) -> Self {
        Self {
            delay,
            result: Err(reason.to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct UrlState {
    script: VecDeque<ScriptedOutcome>,
    last: Option<ScriptedOutcome>,
    starts: Vec<Instant>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Probe client that replays scripted outcomes per URL. Once a script runs out the last
/// outcome repeats; URLs without a script use the default script.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    default_script: Vec<ScriptedOutcome>,
    urls: Mutex<HashMap<String, UrlState>>,
}

impl ScriptedClient {
    pub fn new(default_script: Vec<ScriptedOutcome>) -> Self {
        Self {
            default_script,
            urls: Mutex::new(HashMap::new()),
        }
    }

    pub fn script(self, url: &str, outcomes: Vec<ScriptedOutcome>) -> Self {
        self.urls.lock().unwrap().insert(
            url.to_string(),
            UrlState {
                script: outcomes.into(),
                ..UrlState::default()
            },
        );
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.urls.lock().unwrap().get(url).map_or(0, |s| s.starts.len())
    }

    pub fn starts(&self, url: &str) -> Vec<Instant> {
        self.urls
            .lock()
            .unwrap()
            .get(url)
            .map(|s| s.starts.clone())
            .unwrap_or_default()
    }

    pub fn in_flight(&self, url: &str) -> usize {
        self.urls.lock().unwrap().get(url).map_or(0, |s| s.in_flight)
    }

    pub fn max_in_flight(&self, url: &str) -> usize {
        self.urls.lock().unwrap().get(url).map_or(0, |s| s.max_in_flight)
    }

    fn begin(&self, url: &str) -> ScriptedOutcome {
        let mut urls = self.urls.lock().unwrap();
        let state = urls.entry(url.to_string()).or_insert_with(|| UrlState {
            script: self.default_script.clone().into(),
            ..UrlState::default()
        });

        state.starts.push(Instant::now());
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);

        let outcome = state
            .script
            .pop_front()
            .or_else(|| state.last.clone())
            .unwrap_or_else(|| ScriptedOutcome::status(200, Duration::ZERO));
        state.last = Some(outcome.clone());
        outcome
    }

    fn end(&self, url: &str) {
        if let Some(state) = self.urls.lock().unwrap().get_mut(url) {
            state.in_flight -= 1;
        }
    }
}

/// Decrements the in-flight count even when the probe future is dropped by a timeout
struct InFlight<'a> {
    client: &'a ScriptedClient,
    url: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.client.end(self.url);
    }
}

#[async_trait]
impl ProbeClient for ScriptedClient {
    async fn request(&self, _method: HttpMethod, url: &str, _timeout: Duration) -> Result<ProbeResponse> {
        let outcome = self.begin(url);
        let _guard = InFlight { client: self, url };

        tokio::time::sleep(outcome.delay).await;

        match outcome.result {
            Ok(code) => Ok(ProbeResponse::new(code, 2)),
            Err(reason) => Err(MonitorError::Transport(reason)),
        }
    }
}

/// Store whose writes are slow or always fail
#[derive(Debug, Default)]
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    fail: bool,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    async fn write(&self) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(MonitorError::Store("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HealthStore for SlowStore {
    async fn upsert_health(&self, health: &ServiceHealth) -> Result<()> {
        self.write().await?;
        self.inner.upsert_health(health).await
    }

    async fn create_alert(&self, alert: &Alert) -> Result<()> {
        self.write().await?;
        self.inner.create_alert(alert).await
    }

    async fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        if self.fail {
            return Err(MonitorError::Store("store unavailable".to_string()));
        }
        self.inner.list_active_alerts().await
    }

    async fn resolve_alert(&self, id: &str) -> Result<Alert> {
        self.write().await?;
        self.inner.resolve_alert(id).await
    }
}
