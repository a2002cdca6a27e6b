//! Error types for the health monitor

use std::fmt;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug)]
pub enum MonitorError {
    /// IO operation failed
    Io(std::io::Error),

    /// HTTP request failed
    Http(reqwest::Error),

    /// JSON serialization/deserialization failed
    Json(serde_json::Error),

    /// Process configuration error
    Config(String),

    /// Service configuration rejected at registration
    Validation(String),

    /// A service with this name is already registered
    DuplicateService(String),

    /// No service registered under this name
    ServiceNotFound(String),

    /// No alert with this id
    AlertNotFound(String),

    /// Persistence store failure
    Store(String),

    /// Operation exceeded its time bound
    Timeout(String),

    /// Transport-level failure without an underlying reqwest error
    Transport(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Io(err) => write!(f, "IO error: {}", err),
            MonitorError::Http(err) => write!(f, "HTTP error: {}", err),
            MonitorError::Json(err) => write!(f, "JSON error: {}", err),
            MonitorError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MonitorError::Validation(msg) => write!(f, "Invalid service configuration: {}", msg),
            MonitorError::DuplicateService(name) => {
                write!(f, "Service '{}' is already registered", name)
            }
            MonitorError::ServiceNotFound(name) => write!(f, "Service '{}' not found", name),
            MonitorError::AlertNotFound(id) => write!(f, "Alert '{}' not found", id),
            MonitorError::Store(msg) => write!(f, "Store error: {}", msg),
            MonitorError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            MonitorError::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Io(err) => Some(err),
            MonitorError::Http(err) => Some(err),
            MonitorError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Io(err)
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Http(err)
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Json(err)
    }
}
