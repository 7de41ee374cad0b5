// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Collector abstraction
//!
//! The engine never talks to a modem or the network itself. Telemetry
//! fetchers and probes implement these traits; their failures are
//! non-fatal and only degrade the cycle to neutral inputs.

use crate::error::CollectorError;
use crate::sample::{CellIdentity, UNKNOWN_ID};
use crate::scoring::RadioMetrics;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Radio telemetry read from the modem
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RadioReading {
    pub sinr: Option<f64>,
    pub rsrq: Option<f64>,
    pub rsrp: Option<f64>,
    pub band: Option<String>,
    pub pci: Option<String>,
    pub enodeb: Option<String>,
}

impl RadioReading {
    pub fn metrics(&self) -> RadioMetrics {
        RadioMetrics {
            sinr: self.sinr,
            rsrq: self.rsrq,
            rsrp: self.rsrp,
        }
    }

    /// Serving cell, with `"N/A"` for missing identifiers
    pub fn cell(&self) -> CellIdentity {
        fn or_unknown(v: &Option<String>) -> String {
            match v.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => UNKNOWN_ID.to_string(),
            }
        }
        CellIdentity::new(
            or_unknown(&self.band),
            or_unknown(&self.pci),
            or_unknown(&self.enodeb),
        )
    }
}

/// Result of a short ping burst
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencyReading {
    /// Individual round-trip times (ms) of the answered probes
    pub latency_samples: Vec<f64>,
    /// Percent of probes without an answer
    pub packet_loss: f64,
}

impl LatencyReading {
    /// Mean round-trip time, `None` when nothing answered
    pub fn average(&self) -> Option<f64> {
        mean_rtt(&self.latency_samples)
    }
}

fn mean_rtt(samples: &[f64]) -> Option<f64> {
    let valid: Vec<f64> = samples
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect();
    if valid.is_empty() {
        None
    } else {
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }
}

/// Result of a throughput transfer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThroughputReading {
    /// Sustained rate over the whole transfer window
    pub down_mbps: f64,
    /// Rate over the first fraction of the transfer window
    pub down_mbps_initial: f64,
    pub up_mbps: f64,
    /// Round-trip times observed while the transfer was running
    pub latency_samples: Vec<f64>,
    /// Downlink rate per sampling interval (Mbps), oldest first
    #[serde(default)]
    pub rate_samples: Vec<f64>,
    /// Bytes moved by the transfer, both directions
    #[serde(default)]
    pub total_bytes: u64,
}

impl ThroughputReading {
    /// Mean round-trip time while loaded, `None` when nothing answered
    pub fn loaded_latency(&self) -> Option<f64> {
        mean_rtt(&self.latency_samples)
    }
}

/// Everything collected in one cycle. `None` means the collector was
/// unavailable (or, for throughput, not scheduled).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleInput {
    pub radio: Option<RadioReading>,
    pub latency: Option<LatencyReading>,
    pub throughput: Option<ThroughputReading>,
    /// At least one collector failed this cycle
    pub degraded: bool,
}

/// Modem telemetry fetcher
pub trait TelemetrySource: Send + Sync {
    /// Short name used in logs and health reports
    fn name(&self) -> &'static str;

    fn fetch(&self) -> impl Future<Output = Result<RadioReading, CollectorError>> + Send;
}

/// Latency and throughput prober
pub trait NetworkProbe: Send + Sync {
    fn name(&self) -> &'static str;

    fn measure_latency(&self)
        -> impl Future<Output = Result<LatencyReading, CollectorError>> + Send;

    fn measure_throughput(
        &self,
    ) -> impl Future<Output = Result<ThroughputReading, CollectorError>> + Send;
}
