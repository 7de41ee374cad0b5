// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Metric normalization
//!
//! Maps each raw radio metric onto a bounded `[0, 1]` quality contribution.
//! Absent readings map to a neutral midpoint so that a missing metric
//! degrades confidence without breaking scoring.

use crate::config::{MetricRange, NormalizerConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Radio metrics understood by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Signal to interference plus noise ratio (dB)
    Sinr,
    /// Reference signal received quality (dB)
    Rsrq,
    /// Reference signal received power (dBm)
    Rsrp,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Sinr, Metric::Rsrq, Metric::Rsrp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sinr => "sinr",
            Self::Rsrq => "rsrq",
            Self::Rsrp => "rsrp",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamped linear normalizer
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Map a raw reading to `[0, 1]`. `None` and non-finite values map to
    /// the neutral midpoint; out-of-range values are clamped.
    pub fn normalize(&self, metric: Metric, raw: Option<f64>) -> f64 {
        match raw {
            Some(value) if value.is_finite() => Self::clamp_linear(value, self.range(metric)),
            _ => self.config.neutral,
        }
    }

    /// Configured range for a metric
    pub fn range(&self, metric: Metric) -> MetricRange {
        match metric {
            Metric::Sinr => self.config.sinr,
            Metric::Rsrq => self.config.rsrq,
            Metric::Rsrp => self.config.rsrp,
        }
    }

    pub fn neutral(&self) -> f64 {
        self.config.neutral
    }

    fn clamp_linear(value: f64, range: MetricRange) -> f64 {
        ((value - range.worst) / (range.best - range.worst)).clamp(0.0, 1.0)
    }
}
