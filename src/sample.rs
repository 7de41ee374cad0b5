// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! The per-cycle measurement record.
//!
//! A [`Sample`] is flat on purpose: the same struct is serialized to the
//! JSON API and to the CSV history log, one field per column.

use crate::shape::Shape;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for an unknown serving-cell identifier.
pub const UNKNOWN_ID: &str = "N/A";

/// Headline of a policy verdict not yet backed by earlier ones.
pub const LOW_CONFIDENCE_HEADLINE: &str = "Observed, low confidence";

/// Headline cause, chosen by precedence over the three probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Strong radio, fast start, sustained ceiling
    Policy,
    /// Latency and jitter inflation without signal degradation
    Congestion,
    /// Poor signal explains the shortfall
    Radio,
    /// No hypothesis is strong enough
    #[default]
    Inconclusive,
}

impl Verdict {
    /// Human-readable headline
    pub fn headline(&self) -> &'static str {
        match self {
            Self::Policy => "Policy-like pattern detected",
            Self::Congestion => "Congestion indicators present",
            Self::Radio => "Radio impairment likely",
            Self::Inconclusive => "Inconclusive / gathering data",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.headline())
    }
}

/// Serving cell identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellIdentity {
    pub band: String,
    pub pci: String,
    pub enodeb: String,
}

impl CellIdentity {
    pub fn new(band: impl Into<String>, pci: impl Into<String>, enodeb: impl Into<String>) -> Self {
        Self {
            band: band.into(),
            pci: pci.into(),
            enodeb: enodeb.into(),
        }
    }

    /// Identity used when no telemetry is available
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ID, UNKNOWN_ID, UNKNOWN_ID)
    }

    pub fn is_unknown(&self) -> bool {
        self.band == UNKNOWN_ID && self.pci == UNKNOWN_ID && self.enodeb == UNKNOWN_ID
    }
}

impl Default for CellIdentity {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for CellIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.band, self.pci, self.enodeb)
    }
}

/// One timestamped, fully scored measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,

    // Radio
    pub sinr: Option<f64>,
    pub rsrq: Option<f64>,
    pub rsrp: Option<f64>,
    pub band: String,
    pub pci: String,
    pub enodeb: String,

    // Network
    pub down_mbps: f64,
    pub down_mbps_initial: f64,
    pub up_mbps: f64,
    pub latency_avg: f64,
    pub jitter: f64,
    pub packet_loss: f64,
    /// Mean RTT during the last transfer minus the idle RTT (ms)
    #[serde(default)]
    pub latency_diff: f64,
    /// Bytes moved by this cycle's throughput probe
    #[serde(default)]
    pub data_bytes: u64,
    /// Probe bytes over the rolling usage period, this cycle included
    #[serde(default)]
    pub monthly_bytes: u64,

    // Derived
    pub score: f64,
    pub psi: f64,
    pub ramp_up_ratio: f64,
    /// Steadiness of the last transfer's rate, `0..=1`
    #[serde(default)]
    pub consistency: f64,
    /// Curve shape of the last transfer
    #[serde(default)]
    pub shape: Shape,
    pub radio_prob: f64,
    pub congestion_prob: f64,
    pub policy_prob: f64,
    pub verdict: Verdict,
    /// Score at this hour of day has been steady over the lookback
    #[serde(default)]
    pub stable_hour: bool,
    /// False for a policy verdict with too few earlier confirmations
    #[serde(default = "confirmed")]
    pub confident: bool,
    /// A collector was unavailable and neutral inputs were substituted
    pub degraded: bool,
}

fn confirmed() -> bool {
    true
}

impl Sample {
    /// Serving cell of this sample
    pub fn cell(&self) -> CellIdentity {
        CellIdentity::new(&self.band, &self.pci, &self.enodeb)
    }

    /// Headline shown to users; a policy verdict without enough earlier
    /// confirmations is reported as low confidence.
    pub fn headline(&self) -> &'static str {
        if self.verdict == Verdict::Policy && !self.confident {
            LOW_CONFIDENCE_HEADLINE
        } else {
            self.verdict.headline()
        }
    }

    /// Probe data spent over the usage period, in GiB rounded to 3 places
    pub fn monthly_usage_gb(&self) -> f64 {
        let gb = self.monthly_bytes as f64 / (1024.0 * 1024.0 * 1024.0);
        (gb * 1000.0).round() / 1000.0
    }

    /// Whether all three radio metrics were read
    pub fn has_full_radio(&self) -> bool {
        self.sinr.is_some() && self.rsrq.is_some() && self.rsrp.is_some()
    }
}
