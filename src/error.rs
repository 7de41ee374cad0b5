// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for NetForensics
//!
//! Collector failures are recovered inside the pipeline and never reach
//! readers; only argument and configuration errors are surfaced.

use thiserror::Error;

/// Result type alias for NetForensics operations
pub type Result<T> = std::result::Result<T, ForensicsError>;

/// Main error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForensicsError {
    /// Caller passed an argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Telemetry fetch or probe failed or timed out
    #[error("Collector unavailable: {0}")]
    CollectorUnavailable(#[from] CollectorError),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised by external collectors (modem telemetry, probes)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectorError {
    /// Collector did not answer within its budget
    #[error("{collector} timed out after {timeout_ms}ms")]
    Timeout {
        collector: &'static str,
        timeout_ms: u64,
    },

    /// Collector could not be reached or refused the request
    #[error("{collector} unavailable: {reason}")]
    Unavailable {
        collector: &'static str,
        reason: String,
    },

    /// Collector answered with something we could not interpret
    #[error("{collector} returned unparseable output: {reason}")]
    Parse {
        collector: &'static str,
        reason: String,
    },
}

impl CollectorError {
    /// Name of the collector that failed
    pub fn collector(&self) -> &'static str {
        match self {
            Self::Timeout { collector, .. }
            | Self::Unavailable { collector, .. }
            | Self::Parse { collector, .. } => collector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForensicsError::InvalidArgument("limit must be positive, got 0".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid argument"));
        assert!(msg.contains("limit"));
    }

    #[test]
    fn test_collector_error_conversion() {
        let err = CollectorError::Timeout {
            collector: "ping",
            timeout_ms: 5000,
        };
        assert_eq!(err.collector(), "ping");

        let top: ForensicsError = err.into();
        assert!(matches!(top, ForensicsError::CollectorUnavailable(_)));
        assert!(top.to_string().contains("5000ms"));
    }
}
