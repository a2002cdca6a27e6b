//! Configuration management for the health monitor

use crate::errors::{MonitorError, Result};
use crate::health::duration_ms;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Process-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen address of the read/ops API
    pub bind_addr: String,

    /// Base URL that relative probe targets are resolved against
    pub base_url: String,

    /// JSON file replacing the default service registry
    pub services_file: Option<PathBuf>,

    /// JSON file for durable health and alert state; in-memory when unset
    pub store_path: Option<PathBuf>,

    /// Upper bound on a single persistence write
    pub store_timeout: Duration,

    /// User agent sent with every probe
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            base_url: "http://localhost:3000".to_string(),
            services_file: None,
            store_path: None,
            store_timeout: Duration::from_millis(2000),
            user_agent: format!("health_monitor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(bind_addr) = lookup("MONITOR_BIND_ADDR") {
            config.bind_addr = bind_addr;
        }

        if let Some(base_url) = lookup("MONITOR_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Some(path) = lookup("MONITOR_SERVICES_FILE") {
            if !path.trim().is_empty() {
                config.services_file = Some(PathBuf::from(path));
            }
        }

        if let Some(path) = lookup("MONITOR_STORE_PATH") {
            if !path.trim().is_empty() {
                config.store_path = Some(PathBuf::from(path));
            }
        }

        if let Some(timeout) = lookup("MONITOR_STORE_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                config.store_timeout = Duration::from_millis(ms);
            }
        }

        if let Some(user_agent) = lookup("MONITOR_USER_AGENT") {
            config.user_agent = user_agent;
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.bind_addr.is_empty() {
            return Err("bind_addr cannot be empty".to_string());
        }

        if self.store_timeout.is_zero() {
            return Err("store_timeout must be greater than 0".to_string());
        }

        if let Err(e) = self.base_url() {
            return Err(e.to_string());
        }

        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        // A trailing slash keeps `join` from replacing the last path segment
        let normalized = format!("{}/", self.base_url.trim_end_matches('/'));
        Url::parse(&normalized)
            .map_err(|e| MonitorError::Config(format!("invalid base_url '{}': {}", self.base_url, e)))
    }

    /// Services to register at startup
    pub fn load_services(&self) -> Result<Vec<ServiceConfig>> {
        match &self.services_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let services: Vec<ServiceConfig> = serde_json::from_str(&raw)?;
                Ok(services)
            }
            None => Ok(default_services()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Head,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Head => write!(f, "HEAD"),
        }
    }
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

fn default_enabled() -> bool {
    true
}

/// How and how often one dependency is probed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Unique service name
    pub service: String,

    /// Probe target, absolute or a path relative to the base URL
    pub url: String,

    #[serde(default = "default_method")]
    pub method: HttpMethod,

    /// Hard bound on one probe, in milliseconds on the wire
    #[serde(with = "duration_ms")]
    pub timeout: Duration,

    /// Polling period, in milliseconds on the wire
    #[serde(with = "duration_ms")]
    pub interval: Duration,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ServiceConfig {
    pub fn new(service: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            url: url.into(),
            method: HttpMethod::Get,
            timeout: Duration::from_secs(5),
            interval: Duration::from_secs(30),
            enabled: true,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check the scheduling invariants
    pub fn validate(&self) -> Result<()> {
        if self.service.trim().is_empty() {
            return Err(MonitorError::Validation("service name cannot be empty".to_string()));
        }

        if self.url.trim().is_empty() {
            return Err(MonitorError::Validation(format!(
                "service '{}' has an empty url",
                self.service
            )));
        }

        if self.interval.is_zero() {
            return Err(MonitorError::Validation(format!(
                "service '{}': interval must be greater than 0",
                self.service
            )));
        }

        if self.timeout.is_zero() {
            return Err(MonitorError::Validation(format!(
                "service '{}': timeout must be greater than 0",
                self.service
            )));
        }

        // A probe must finish, or be abandoned, before the next tick is due
        if self.timeout >= self.interval {
            return Err(MonitorError::Validation(format!(
                "service '{}': timeout ({}ms) must be shorter than interval ({}ms)",
                self.service,
                self.timeout.as_millis(),
                self.interval.as_millis()
            )));
        }

        Ok(())
    }

    /// Validate and rewrite `url` as an absolute http(s) URL
    pub fn resolve(mut self, base_url: Option<&Url>) -> Result<Self> {
        self.validate()?;

        let url = if self.url.starts_with('/') {
            let base = base_url.ok_or_else(|| {
                MonitorError::Validation(format!(
                    "service '{}': relative url '{}' needs a base url",
                    self.service, self.url
                ))
            })?;
            base.join(self.url.trim_start_matches('/'))
        } else {
            Url::parse(&self.url)
        }
        .map_err(|e| {
            MonitorError::Validation(format!(
                "service '{}': malformed url '{}': {}",
                self.service, self.url, e
            ))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(MonitorError::Validation(format!(
                "service '{}': unsupported url scheme '{}'",
                self.service,
                url.scheme()
            )));
        }

        self.url = url.to_string();
        Ok(self)
    }
}

/// Built-in registry; intervals grow with how slowly a dependency is expected to change
pub fn default_services() -> Vec<ServiceConfig> {
    let secs = Duration::from_secs;

    vec![
        ServiceConfig::new("database", "/api/health/database")
            .with_timeout(secs(5))
            .with_interval(secs(30)),
        ServiceConfig::new("email", "/api/health/email")
            .with_timeout(secs(10))
            .with_interval(secs(60)),
        ServiceConfig::new("stripe", "/api/health/stripe")
            .with_timeout(secs(10))
            .with_interval(secs(120)),
        ServiceConfig::new("esocial", "/api/health/esocial")
            .with_timeout(secs(15))
            .with_interval(secs(300)),
        ServiceConfig::new("whatsapp", "/api/health/whatsapp")
            .with_timeout(secs(10))
            .with_interval(secs(120)),
        ServiceConfig::new("sms", "/api/health/sms")
            .with_timeout(secs(10))
            .with_interval(secs(120)),
        ServiceConfig::new("push", "/api/health/push")
            .with_timeout(secs(5))
            .with_interval(secs(60)),
    ]
}
