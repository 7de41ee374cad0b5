// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Scoring engine
//!
//! Turns normalized radio metrics into a composite `score`, and relates the
//! observed throughput to what that score should deliver:
//!
//! - `score`: weighted mean of normalized SINR/RSRQ/RSRP, `0..=100`
//! - `psi` (Policy Shaping Index): shortfall of observed throughput below the
//!   expectation for `score`, `0..=100`
//! - `ramp_up_ratio`: initial transfer rate over sustained rate

use crate::config::{NormalizerConfig, ScoringConfig};
use crate::normalize::{Metric, Normalizer};

/// Raw radio metrics for one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RadioMetrics {
    pub sinr: Option<f64>,
    pub rsrq: Option<f64>,
    pub rsrp: Option<f64>,
}

/// Output of the scoring stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub score: f64,
    pub psi: f64,
    pub ramp_up_ratio: f64,
}

/// Composite scoring
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    normalizer: Normalizer,
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(normalizer: NormalizerConfig, config: ScoringConfig) -> Self {
        Self {
            normalizer: Normalizer::new(normalizer),
            config,
        }
    }

    /// Composite radio-quality index, rounded to an integer in `0..=100`
    pub fn score(&self, radio: &RadioMetrics) -> f64 {
        let weighted = self.config.weight_sinr
            * self.normalizer.normalize(Metric::Sinr, radio.sinr)
            + self.config.weight_rsrq * self.normalizer.normalize(Metric::Rsrq, radio.rsrq)
            + self.config.weight_rsrp * self.normalizer.normalize(Metric::Rsrp, radio.rsrp);
        (100.0 * weighted).round().clamp(0.0, 100.0)
    }

    /// Weight of a single metric in the composite
    pub fn weight(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Sinr => self.config.weight_sinr,
            Metric::Rsrq => self.config.weight_rsrq,
            Metric::Rsrp => self.config.weight_rsrp,
        }
    }

    /// Ratio of the initial transfer rate to the sustained rate.
    ///
    /// Returns 1.0 when the sustained rate is zero, negative or unmeasured.
    pub fn ramp_up_ratio(&self, down_mbps_initial: f64, down_mbps: f64) -> f64 {
        if !down_mbps.is_finite() || down_mbps <= 0.0 || !down_mbps_initial.is_finite() {
            return 1.0;
        }
        down_mbps_initial.max(0.0) / down_mbps.max(self.config.epsilon_mbps)
    }

    /// Whether a ramp-up ratio signals a burst-then-throttle transfer
    pub fn is_ramp_down(&self, ratio: f64) -> bool {
        ratio > self.config.ramp_threshold
    }

    /// Expected downlink for a score. Piecewise-linear, strictly increasing.
    pub fn expected_mbps(&self, score: f64) -> f64 {
        let s = score.clamp(0.0, 100.0) / 100.0;
        self.config.expected_floor_mbps
            + s * (self.config.expected_ceiling_mbps - self.config.expected_floor_mbps)
    }

    /// Policy Shaping Index: percentage shortfall below expectation.
    ///
    /// `None` means throughput has never been measured, which carries no
    /// evidence and yields 0.
    pub fn psi(&self, score: f64, down_mbps: Option<f64>) -> f64 {
        let observed = match down_mbps {
            Some(v) if v.is_finite() => v.max(0.0),
            _ => return 0.0,
        };
        let expected = self.expected_mbps(score);
        (100.0 * (expected - observed) / expected).clamp(0.0, 100.0)
    }

    /// Score a cycle in one call
    pub fn evaluate(
        &self,
        radio: &RadioMetrics,
        down_mbps: Option<f64>,
        down_mbps_initial: Option<f64>,
    ) -> Scores {
        let score = self.score(radio);
        let ramp_up_ratio = match (down_mbps_initial, down_mbps) {
            (Some(initial), Some(sustained)) => self.ramp_up_ratio(initial, sustained),
            _ => 1.0,
        };
        Scores {
            score,
            psi: self.psi(score, down_mbps),
            ramp_up_ratio,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }
}
