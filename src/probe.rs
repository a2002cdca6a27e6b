//! HTTP probing and response classification

use crate::config::{HttpMethod, ServiceConfig};
use crate::errors::{MonitorError, Result};
use crate::health::{HealthStatus, ServiceHealth};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::debug;

/// Responses slower than this share of the timeout are reported as degraded
const SLOW_RESPONSE_RATIO: f64 = 0.8;

/// Raw outcome of a probe request that produced a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub reason: String,
    pub body_len: usize,
}

impl ProbeResponse {
    pub fn new(status: u16, body_len: usize) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown")
            .to_string();

        Self {
            status,
            reason,
            body_len,
        }
    }
}

/// HTTP client seam used by the probe executor
#[async_trait]
pub trait ProbeClient: Send + Sync {
    async fn request(&self, method: HttpMethod, url: &str, timeout: Duration) -> Result<ProbeResponse>;
}

/// `reqwest`-backed probe client
#[derive(Debug, Clone)]
pub struct HttpProbeClient {
    client: Client,
}

impl HttpProbeClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ProbeClient for HttpProbeClient {
    async fn request(&self, method: HttpMethod, url: &str, timeout: Duration) -> Result<ProbeResponse> {
        let response = self
            .client
            .request(method.as_reqwest(), url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MonitorError::Timeout(format!("request timed out after {}ms", timeout.as_millis()))
                } else if e.is_connect() {
                    MonitorError::Transport(format!("connection failed: {}", e))
                } else {
                    MonitorError::Http(e)
                }
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(MonitorError::Http)?;

        Ok(ProbeResponse::new(status, body.len()))
    }
}

/// Runs one bounded-time probe and classifies the result.
///
/// No retry happens here. The service's polling interval is the retry cadence; one tick
/// issues exactly one request.
#[derive(Clone)]
pub struct ProbeExecutor {
    client: Arc<dyn ProbeClient>,
}

impl ProbeExecutor {
    pub fn new(client: Arc<dyn ProbeClient>) -> Self {
        Self { client }
    }

    /// Probe a service. Every failure is encoded in the returned snapshot.
    pub async fn probe(&self, config: &ServiceConfig) -> ServiceHealth {
        let start = Instant::now();

        let outcome = timeout(
            config.timeout,
            self.client.request(config.method, &config.url, config.timeout),
        )
        .await
        .unwrap_or_else(|_| {
            Err(MonitorError::Timeout(format!(
                "request timed out after {}ms",
                config.timeout.as_millis()
            )))
        });

        let response_time = start.elapsed();

        let health = match outcome {
            Ok(response) => classify(config, response, response_time),
            Err(e) => {
                let reason = failure_reason(&e);
                ServiceHealth::new(&config.service, HealthStatus::Down, response_time)
                    .with_error(reason.clone())
                    .with_detail("error", reason)
                    .with_detail("responseTime", response_time.as_millis() as u64)
            }
        };

        debug!(
            service = %config.service,
            status = %health.status,
            response_time_ms = response_time.as_millis() as u64,
            "Probe finished"
        );

        health
    }
}

fn classify(config: &ServiceConfig, response: ProbeResponse, response_time: Duration) -> ServiceHealth {
    let slow = response_time.as_secs_f64() > config.timeout.as_secs_f64() * SLOW_RESPONSE_RATIO;

    let (status, error) = match response.status {
        500..=u16::MAX => (
            HealthStatus::Down,
            Some(format!("HTTP {}: {}", response.status, response.reason)),
        ),
        400..=499 => (HealthStatus::Degraded, Some(format!("HTTP {}", response.status))),
        _ if slow => (HealthStatus::Degraded, Some("response time degraded".to_string())),
        _ => (HealthStatus::Healthy, None),
    };

    let mut health = ServiceHealth::new(&config.service, status, response_time)
        .with_detail("statusCode", response.status)
        .with_detail("responseTime", response_time.as_millis() as u64)
        .with_detail("responseSize", response.body_len as u64);

    if let Some(error) = error {
        health = health.with_error(error);
    }

    health
}

fn failure_reason(err: &MonitorError) -> String {
    match err {
        MonitorError::Timeout(msg) | MonitorError::Transport(msg) => msg.clone(),
        MonitorError::Http(e) => e.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedClient, ScriptedOutcome};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(url: &str) -> ServiceConfig {
        ServiceConfig::new("database", url)
            .with_timeout(Duration::from_secs(5))
            .with_interval(Duration::from_secs(30))
    }

    fn executor(outcomes: Vec<ScriptedOutcome>) -> ProbeExecutor {
        ProbeExecutor::new(Arc::new(ScriptedClient::new(outcomes)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_success_is_healthy() {
        let exec = executor(vec![ScriptedOutcome::status(200, Duration::from_millis(100))]);
        let health = exec.probe(&service("http://db/health")).await;

        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(health.error.is_none());
        assert_eq!(health.response_time, Duration::from_millis(100));
        assert_eq!(health.details["statusCode"], 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_down() {
        let exec = executor(vec![ScriptedOutcome::status(503, Duration::from_millis(10))]);
        let health = exec.probe(&service("http://db/health")).await;

        assert_eq!(health.status, HealthStatus::Down);
        assert_eq!(health.error.as_deref(), Some("HTTP 503: Service Unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_degraded() {
        let exec = executor(vec![ScriptedOutcome::status(404, Duration::from_millis(10))]);
        let health = exec.probe(&service("http://db/health")).await;

        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.error.as_deref(), Some("HTTP 404"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_is_degraded() {
        // 4.5s against a 5s timeout crosses the 80% threshold
        let exec = executor(vec![ScriptedOutcome::status(200, Duration::from_millis(4500))]);
        let health = exec.probe(&service("http://db/health")).await;

        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.error.as_deref(), Some("response time degraded"));

        let exec = executor(vec![ScriptedOutcome::status(200, Duration::from_millis(3900))]);
        let health = exec.probe(&service("http://db/health")).await;
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_request_times_out_as_down() {
        let exec = executor(vec![ScriptedOutcome::status(200, Duration::from_secs(60))]);
        let health = exec.probe(&service("http://db/health")).await;

        assert_eq!(health.status, HealthStatus::Down);
        assert_eq!(health.error.as_deref(), Some("request timed out after 5000ms"));
        assert_eq!(health.response_time, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_down() {
        let exec = executor(vec![ScriptedOutcome::failure("connection refused", Duration::ZERO)]);
        let health = exec.probe(&service("http://db/health")).await;

        assert_eq!(health.status, HealthStatus::Down);
        assert_eq!(health.error.as_deref(), Some("connection refused"));
        assert_eq!(health.details["error"], "connection refused");
    }

    #[tokio::test]
    async fn test_http_client_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health/database"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/api/health/email"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpProbeClient::new("health_monitor-test").unwrap();
        let exec = ProbeExecutor::new(Arc::new(client));

        let health = exec
            .probe(&service(&format!("{}/api/health/database", server.uri())))
            .await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.details["responseSize"], 11);

        let email = ServiceConfig::new("email", format!("{}/api/health/email", server.uri()))
            .with_method(HttpMethod::Head)
            .with_timeout(Duration::from_secs(5))
            .with_interval(Duration::from_secs(60));
        let health = exec.probe(&email).await;
        assert_eq!(health.status, HealthStatus::Down);
        assert_eq!(health.error.as_deref(), Some("HTTP 500: Internal Server Error"));
    }

    #[tokio::test]
    async fn test_http_client_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = HttpProbeClient::new("health_monitor-test").unwrap();
        let exec = ProbeExecutor::new(Arc::new(client));

        let config = ServiceConfig::new("database", format!("{}/slow", server.uri()))
            .with_timeout(Duration::from_millis(100))
            .with_interval(Duration::from_secs(1));
        let health = exec.probe(&config).await;

        assert_eq!(health.status, HealthStatus::Down);
        assert!(health.error.is_some());
    }

    #[tokio::test]
    async fn test_connection_refused_is_down() {
        let client = HttpProbeClient::new("health_monitor-test").unwrap();
        let exec = ProbeExecutor::new(Arc::new(client));

        let health = exec.probe(&service("http://127.0.0.1:1/health")).await;
        assert_eq!(health.status, HealthStatus::Down);
        let error = health.error.unwrap();
        assert!(error.starts_with("connection failed"), "unexpected error: {}", error);
    }
}
