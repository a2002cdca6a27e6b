//! Status transition detection

use crate::health::{Alert, AlertSeverity, AlertType, HealthStatus, ServiceHealth};

/// Turns status transitions into alerts.
///
/// Every transition raises exactly one alert and a status that persists raises nothing.
/// Rapid flapping is not debounced: each down/recovered cycle is reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertEngine;

impl AlertEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        service: &str,
        previous: Option<&ServiceHealth>,
        current: &ServiceHealth,
    ) -> Option<Alert> {
        // First observation only establishes the baseline
        let previous = previous?;
        if previous.status == current.status {
            return None;
        }

        let (alert_type, severity, message) = match current.status {
            HealthStatus::Down => (
                AlertType::Down,
                AlertSeverity::Critical,
                format!("Service {} is down", service),
            ),
            HealthStatus::Degraded => (
                AlertType::Degraded,
                AlertSeverity::Medium,
                format!("Service {} has degraded performance", service),
            ),
            HealthStatus::Healthy => (
                AlertType::Recovered,
                AlertSeverity::Low,
                format!("Service {} has recovered", service),
            ),
        };

        Some(Alert::new(service, alert_type, severity, message))
    }
}
