// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Collector health monitoring
//!
//! Tracks consecutive failures per collector and derives a status from
//! them. The overall status is the worst component status.

use crate::error::CollectorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Component is healthy
    Healthy,
    /// Component is degraded but functional
    Degraded,
    /// Component is unhealthy
    Unhealthy,
    /// Component has not reported yet
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Check if the status is operational (healthy or degraded)
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    fn severity(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Healthy => 1,
            Self::Degraded => 2,
            Self::Unhealthy => 3,
        }
    }
}

/// Failure thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures before a collector is degraded
    pub degraded_after: u32,
    /// Consecutive failures before a collector is unhealthy
    pub unhealthy_after: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            degraded_after: 1,
            unhealthy_after: 5,
        }
    }
}

/// Health of one collector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentHealth {
    pub component: String,
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

impl ComponentHealth {
    fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            status: HealthStatus::Unknown,
            consecutive_failures: 0,
            total_failures: 0,
            last_error: None,
            last_success: None,
            last_failure: None,
        }
    }
}

/// Serializable health report
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
}

/// Health monitor for the collectors
#[derive(Debug, Clone, Default)]
pub struct HealthMonitor {
    components: Vec<ComponentHealth>,
    config: HealthConfig,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HealthConfig) -> Self {
        Self {
            components: Vec::new(),
            config,
        }
    }

    /// Register a component so it appears as `unknown` before its first call
    pub fn register(&mut self, component: &str) {
        self.entry(component);
    }

    pub fn record_success(&mut self, component: &str, at: DateTime<Utc>) {
        let entry = self.entry(component);
        entry.consecutive_failures = 0;
        entry.last_success = Some(at);
        entry.status = HealthStatus::Healthy;
    }

    pub fn record_failure(&mut self, component: &str, error: &CollectorError, at: DateTime<Utc>) {
        let (degraded_after, unhealthy_after) =
            (self.config.degraded_after, self.config.unhealthy_after);
        let entry = self.entry(component);
        entry.consecutive_failures += 1;
        entry.total_failures += 1;
        entry.last_error = Some(error.to_string());
        entry.last_failure = Some(at);
        entry.status = if entry.consecutive_failures >= unhealthy_after {
            HealthStatus::Unhealthy
        } else if entry.consecutive_failures >= degraded_after {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
    }

    /// Worst component status, `Unknown` when nothing has reported
    pub fn status(&self) -> HealthStatus {
        self.components
            .iter()
            .map(|c| c.status)
            .max_by_key(HealthStatus::severity)
            .unwrap_or_default()
    }

    pub fn get(&self, component: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.component == component)
    }

    pub fn components(&self) -> &[ComponentHealth] {
        &self.components
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: self.status(),
            components: self.components.clone(),
        }
    }

    pub fn is_operational(&self) -> bool {
        self.status().is_ok()
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    fn entry(&mut self, component: &str) -> &mut ComponentHealth {
        let idx = match self.components.iter().position(|c| c.component == component) {
            Some(idx) => idx,
            None => {
                self.components.push(ComponentHealth::new(component));
                self.components.len() - 1
            }
        };
        &mut self.components[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout(collector: &'static str) -> CollectorError {
        CollectorError::Timeout {
            collector,
            timeout_ms: 5000,
        }
    }

    #[test]
    fn test_health_status_is_ok() {
        assert!(HealthStatus::Healthy.is_ok());
        assert!(HealthStatus::Degraded.is_ok());
        assert!(!HealthStatus::Unhealthy.is_ok());
        assert!(!HealthStatus::Unknown.is_ok());
    }

    #[test]
    fn test_empty_monitor_is_unknown() {
        let monitor = HealthMonitor::new();
        assert_eq!(monitor.status(), HealthStatus::Unknown);
    }

    #[test]
    fn test_registered_component_is_unknown() {
        let mut monitor = HealthMonitor::new();
        monitor.register("telemetry");
        assert_eq!(
            monitor.get("telemetry").unwrap().status,
            HealthStatus::Unknown
        );
    }

    #[test]
    fn test_failure_transitions() {
        let mut monitor = HealthMonitor::new();
        let now = Utc::now();
        monitor.record_success("telemetry", now);
        assert_eq!(monitor.status(), HealthStatus::Healthy);

        monitor.record_failure("telemetry", &timeout("modem"), now);
        assert_eq!(monitor.status(), HealthStatus::Degraded);

        for _ in 0..4 {
            monitor.record_failure("telemetry", &timeout("modem"), now);
        }
        let entry = monitor.get("telemetry").unwrap();
        assert_eq!(entry.status, HealthStatus::Unhealthy);
        assert_eq!(entry.consecutive_failures, 5);
        assert!(entry.last_error.as_deref().unwrap().contains("timed out"));
        assert!(!monitor.is_operational());

        monitor.record_success("telemetry", now);
        assert_eq!(monitor.status(), HealthStatus::Healthy);
        assert_eq!(monitor.get("telemetry").unwrap().total_failures, 5);
    }

    #[test]
    fn test_overall_is_worst_component() {
        let mut monitor = HealthMonitor::new();
        let now = Utc::now();
        monitor.record_success("telemetry", now);
        monitor.record_success("latency", now);
        monitor.record_failure("throughput", &timeout("http"), now);
        assert_eq!(monitor.status(), HealthStatus::Degraded);
        assert_eq!(monitor.report().components.len(), 3);
    }
}
