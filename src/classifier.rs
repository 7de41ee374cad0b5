// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Root-cause classification module
//!
//! Answers three independent yes/no questions about the current cycle:
//! is the radio to blame, is the network congested, is the link shaped.
//! The probabilities are clamped separately and deliberately do not sum
//! to one; the headline [`Verdict`] is picked by precedence
//! (policy > congestion > radio > inconclusive).

use crate::config::ClassifierConfig;
use crate::sample::Verdict;
use crate::shape::Shape;
use crate::window::{FieldStats, TrailingWindow};
use serde::{Deserialize, Serialize};

/// Per-cycle inputs to the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierInput {
    pub score: f64,
    pub psi: f64,
    pub ramp_up_ratio: f64,
    /// Ramp-up ratio exceeded the burst-then-throttle threshold
    pub ramp_down: bool,
    /// `None` when latency was not measured this cycle
    pub latency_avg: Option<f64>,
    /// `None` when no fresh round-trip times arrived this cycle
    pub jitter: Option<f64>,
    /// Percent of probes lost
    pub packet_loss: f64,
    /// Mean RTT under load minus idle RTT, `None` without a transfer
    pub latency_diff: Option<f64>,
    /// Curve shape of the last transfer
    pub shape: Shape,
    /// Steady-state rate consistency of the last transfer
    pub consistency: Option<f64>,
    /// The score at this hour of day has been steady for days
    pub stable_hour: bool,
}

impl Default for ClassifierInput {
    fn default() -> Self {
        Self {
            score: 50.0,
            psi: 0.0,
            ramp_up_ratio: 1.0,
            ramp_down: false,
            latency_avg: None,
            jitter: None,
            packet_loss: 0.0,
            latency_diff: None,
            shape: Shape::Uncertain,
            consistency: None,
            stable_hour: false,
        }
    }
}

/// Independent likelihoods for the three hypotheses
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Likelihoods {
    pub radio: f64,
    pub congestion: f64,
    pub policy: f64,
}

/// Heuristic classifier
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify one cycle against the trailing window of prior samples
    pub fn classify(&self, input: &ClassifierInput, window: &TrailingWindow) -> Likelihoods {
        Likelihoods {
            radio: self.radio_likelihood(input.score, input.psi),
            congestion: self.congestion_likelihood(input, window),
            policy: self.policy_likelihood(input, window),
        }
    }

    /// High when the signal is poor and the shortfall is explained by it.
    ///
    /// A high PSI means throughput misses even the degraded expectation,
    /// which points elsewhere, so the curve is gated down as PSI rises.
    pub fn radio_likelihood(&self, score: f64, psi: f64) -> f64 {
        let deficit = (100.0 - score.clamp(0.0, 100.0)) / 100.0;
        let base = logistic(self.config.radio_steepness * (deficit - 0.5));
        let gate = 1.0 - ramp(psi, self.config.psi_elevated, 100.0);
        (base * gate).clamp(0.0, 1.0)
    }

    /// High when latency and jitter inflate over their baseline (or past
    /// absolute floors), loss rises, or the path slows down under load,
    /// while the radio stays healthy.
    ///
    /// The baseline only covers window entries that were not congested
    /// themselves, so a long congestion episode is not absorbed into it.
    pub fn congestion_likelihood(&self, input: &ClassifierInput, window: &TrailingWindow) -> f64 {
        let c = &self.config;

        let latency_ev = input.latency_avg.map_or(0.0, |current| {
            let baseline = self.baseline(window.baseline_latency(), c.latency_reference_ms);
            if current > c.latency_high_ms {
                1.0
            } else {
                self.inflation(current, baseline, c.latency_reference_ms)
            }
        });

        let jitter_ev = input.jitter.map_or(0.0, |current| {
            let baseline = self.baseline(window.baseline_jitter(), c.jitter_reference_ms);
            if current > c.jitter_high_ms {
                1.0
            } else {
                self.inflation(current, baseline, c.jitter_reference_ms)
            }
        });

        let loss_ev = (input.packet_loss / c.loss_saturation_pct).clamp(0.0, 1.0);
        let load_ev = input
            .latency_diff
            .map_or(0.0, |d| ramp(d, c.load_diff_low_ms, c.load_diff_high_ms));
        let climb_ev = if input.shape == Shape::LinearClimb {
            1.0
        } else {
            0.0
        };

        let evidence = (0.30 * latency_ev
            + 0.25 * jitter_ev
            + 0.15 * loss_ev
            + 0.20 * load_ev
            + 0.10 * climb_ev)
            .clamp(0.0, 1.0);
        (self.radio_health(input.score) * evidence).clamp(0.0, 1.0)
    }

    /// High for good signal, a fast start followed by a flat ceiling, and a
    /// sustained shortfall.
    pub fn policy_likelihood(&self, input: &ClassifierInput, window: &TrailingWindow) -> f64 {
        let c = &self.config;

        let psi_ev = (input.psi / c.psi_saturation).clamp(0.0, 1.0);
        let ramp_ev = if input.ramp_down {
            ramp(input.ramp_up_ratio, 1.0, c.ramp_saturation)
        } else {
            0.0
        };
        let persistence = window.psi_persistence(c.psi_elevated);
        // A steady rate only matters when it sits below what the signal supports
        let ceiling_ev = if input.psi > c.psi_elevated {
            let flat = if input.shape == Shape::Plateau { 1.0 } else { 0.0 };
            input.consistency.unwrap_or(0.0).max(flat).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let stable_ev = if input.stable_hour { 1.0 } else { 0.0 };

        let mut policy = self.radio_health(input.score)
            * (0.40 * psi_ev
                + 0.25 * ramp_ev
                + 0.15 * persistence
                + 0.10 * ceiling_ev
                + 0.10 * stable_ev)
                .clamp(0.0, 1.0);

        // Extreme jitter and heavy queueing are congestion signatures
        if input.jitter.is_some_and(|j| j > c.jitter_extreme_ms) {
            policy *= 0.5;
        }
        if input.latency_diff.is_some_and(|d| d > c.load_diff_extreme_ms) {
            policy *= 0.6;
        }
        policy.clamp(0.0, 1.0)
    }

    /// First-true-wins headline
    pub fn verdict(&self, likelihoods: &Likelihoods) -> Verdict {
        let t = self.config.verdict_threshold;
        if likelihoods.policy > t {
            Verdict::Policy
        } else if likelihoods.congestion > t {
            Verdict::Congestion
        } else if likelihoods.radio > t {
            Verdict::Radio
        } else {
            Verdict::Inconclusive
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// 0 below `radio_gate_low`, 1 above `radio_gate_high`
    fn radio_health(&self, score: f64) -> f64 {
        ramp(score, self.config.radio_gate_low, self.config.radio_gate_high)
    }

    /// Window mean once enough entries exist, else the reference
    fn baseline(&self, stats: FieldStats, reference: f64) -> f64 {
        if stats.count >= self.config.min_baseline_samples {
            stats.mean
        } else {
            reference
        }
    }

    /// Excess of `current` over `baseline`, relative to the larger of the
    /// baseline and a reference scale, saturating at `inflation_saturation`.
    fn inflation(&self, current: f64, baseline: f64, reference: f64) -> f64 {
        if !current.is_finite() {
            return 0.0;
        }
        let scale = baseline.max(reference) * (self.config.inflation_saturation - 1.0);
        ((current - baseline) / scale).clamp(0.0, 1.0)
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Linear ramp from 0 at `low` to 1 at `high`, clamped
fn ramp(x: f64, low: f64, high: f64) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    ((x - low) / (high - low)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowEntry;

    fn input(score: f64, psi: f64, ramp_up_ratio: f64) -> ClassifierInput {
        ClassifierInput {
            score,
            psi,
            ramp_up_ratio,
            ramp_down: ramp_up_ratio > 1.2,
            ..Default::default()
        }
    }

    fn steady_window(latency: f64, jitter: f64) -> TrailingWindow {
        let mut window = TrailingWindow::new(20);
        for _ in 0..10 {
            window.push(WindowEntry {
                score: 85.0,
                psi: 0.0,
                latency: Some(latency),
                jitter: Some(jitter),
                congested: false,
            });
        }
        window
    }

    #[test]
    fn test_policy_scenario() {
        let classifier = Classifier::default();
        let result = classifier.classify(&input(95.0, 70.0, 2.0), &TrailingWindow::new(20));
        assert!(result.policy > 0.5, "policy = {}", result.policy);
        assert!(result.radio < 0.5, "radio = {}", result.radio);
        assert_eq!(classifier.verdict(&result), Verdict::Policy);
    }

    #[test]
    fn test_radio_scenario() {
        let classifier = Classifier::default();
        let result = classifier.classify(&input(20.0, 5.0, 1.0), &TrailingWindow::new(20));
        assert!(result.radio > 0.5, "radio = {}", result.radio);
        assert!(result.policy < 0.5);
        assert_eq!(classifier.verdict(&result), Verdict::Radio);
    }

    #[test]
    fn test_radio_gated_by_high_psi() {
        let classifier = Classifier::default();
        let low_psi = classifier.radio_likelihood(20.0, 5.0);
        let high_psi = classifier.radio_likelihood(20.0, 95.0);
        assert!(high_psi < low_psi);
        assert!(classifier.radio_likelihood(20.0, 100.0) < 1e-9);
    }

    #[test]
    fn test_congestion_detected_against_baseline() {
        let classifier = Classifier::default();
        let window = steady_window(40.0, 4.0);
        let mut current = input(85.0, 20.0, 1.0);
        current.latency_avg = Some(160.0);
        current.jitter = Some(30.0);
        current.packet_loss = 3.0;

        let result = classifier.classify(&current, &window);
        assert!(result.congestion > 0.5, "congestion = {}", result.congestion);
        assert_eq!(classifier.verdict(&result), Verdict::Congestion);
    }

    #[test]
    fn test_congestion_suppressed_by_poor_signal() {
        let classifier = Classifier::default();
        let window = steady_window(40.0, 4.0);
        let mut current = input(30.0, 20.0, 1.0);
        current.latency_avg = Some(160.0);
        current.jitter = Some(30.0);

        let result = classifier.classify(&current, &window);
        assert!(result.congestion < 1e-9);
    }

    #[test]
    fn test_steady_latency_is_not_congestion() {
        let classifier = Classifier::default();
        let window = steady_window(40.0, 4.0);
        let mut current = input(85.0, 0.0, 1.0);
        current.latency_avg = Some(41.0);
        current.jitter = Some(4.0);

        let result = classifier.classify(&current, &window);
        assert!(result.congestion < 0.1);
        assert_eq!(classifier.verdict(&result), Verdict::Inconclusive);
    }

    #[test]
    fn test_sustained_congestion_not_absorbed_into_baseline() {
        let classifier = Classifier::default();
        let mut window = steady_window(40.0, 4.0);
        // Below the absolute floors: only the baseline can flag these
        let mut current = input(80.0, 30.0, 1.0);
        current.latency_avg = Some(120.0);
        current.jitter = Some(25.0);

        for _ in 0..30 {
            let result = classifier.classify(&current, &window);
            assert!(result.congestion > 0.5, "congestion = {}", result.congestion);
            window.push(WindowEntry {
                score: 80.0,
                psi: 30.0,
                latency: current.latency_avg,
                jitter: current.jitter,
                congested: classifier.verdict(&result) == Verdict::Congestion,
            });
        }
        assert_eq!(window.baseline_latency().count, 0);
    }

    #[test]
    fn test_absolute_floors_override_elevated_baseline() {
        let classifier = Classifier::default();
        let mut window = TrailingWindow::new(20);
        // Elevated cycles that were never flagged still form the baseline
        for _ in 0..20 {
            window.push(WindowEntry {
                score: 80.0,
                psi: 30.0,
                latency: Some(170.0),
                jitter: Some(35.0),
                congested: false,
            });
        }
        let mut current = input(80.0, 30.0, 1.0);
        current.latency_avg = Some(170.0);
        current.jitter = Some(35.0);
        let result = classifier.classify(&current, &window);
        assert!(result.congestion > 0.5, "congestion = {}", result.congestion);
    }

    #[test]
    fn test_latency_under_load_and_climb_raise_congestion() {
        let classifier = Classifier::default();
        let window = steady_window(40.0, 4.0);
        let idle = input(85.0, 20.0, 1.0);
        let mut loaded = idle;
        loaded.latency_diff = Some(60.0);
        loaded.shape = Shape::LinearClimb;

        let before = classifier.congestion_likelihood(&idle, &window);
        let after = classifier.congestion_likelihood(&loaded, &window);
        assert!(before < 1e-9);
        assert!((after - 0.3).abs() < 1e-9, "congestion = {}", after);

        loaded.latency_diff = Some(35.0);
        loaded.shape = Shape::Plateau;
        assert!((classifier.congestion_likelihood(&loaded, &window) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_flat_ceiling_raises_policy_only_with_shortfall() {
        let classifier = Classifier::default();
        let window = TrailingWindow::new(20);

        let mut shaped = input(90.0, 70.0, 1.0);
        let bare = classifier.policy_likelihood(&shaped, &window);
        shaped.shape = Shape::Plateau;
        assert!((classifier.policy_likelihood(&shaped, &window) - bare - 0.1).abs() < 1e-9);

        let mut healthy = input(90.0, 10.0, 1.0);
        let bare = classifier.policy_likelihood(&healthy, &window);
        healthy.shape = Shape::Plateau;
        healthy.consistency = Some(0.95);
        assert_eq!(classifier.policy_likelihood(&healthy, &window), bare);
    }

    #[test]
    fn test_stable_hour_and_queueing_adjust_policy() {
        let classifier = Classifier::default();
        let window = TrailingWindow::new(20);
        let base = input(95.0, 70.0, 2.0);
        let p = classifier.policy_likelihood(&base, &window);

        let stable = ClassifierInput {
            stable_hour: true,
            ..base
        };
        assert!((classifier.policy_likelihood(&stable, &window) - p - 0.1).abs() < 1e-9);

        let queued = ClassifierInput {
            latency_diff: Some(250.0),
            ..base
        };
        assert!((classifier.policy_likelihood(&queued, &window) - p * 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_extreme_jitter_halves_policy() {
        let classifier = Classifier::default();
        let window = TrailingWindow::new(20);
        let calm = classifier.policy_likelihood(&input(95.0, 70.0, 2.0), &window);
        let mut noisy = input(95.0, 70.0, 2.0);
        noisy.jitter = Some(150.0);
        let halved = classifier.policy_likelihood(&noisy, &window);
        assert!((halved - calm * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_persistence_raises_policy() {
        let classifier = Classifier::default();
        let empty = TrailingWindow::new(20);
        let mut shaped = TrailingWindow::new(20);
        for _ in 0..20 {
            shaped.push(WindowEntry {
                score: 90.0,
                psi: 65.0,
                latency: None,
                jitter: None,
                congested: false,
            });
        }
        let current = input(90.0, 60.0, 1.0);
        assert!(
            classifier.policy_likelihood(&current, &shaped)
                > classifier.policy_likelihood(&current, &empty)
        );
    }

    #[test]
    fn test_verdict_precedence() {
        let classifier = Classifier::default();
        let all_high = Likelihoods {
            radio: 0.9,
            congestion: 0.9,
            policy: 0.9,
        };
        assert_eq!(classifier.verdict(&all_high), Verdict::Policy);
        let no_policy = Likelihoods {
            policy: 0.2,
            ..all_high
        };
        assert_eq!(classifier.verdict(&no_policy), Verdict::Congestion);
        assert_eq!(
            classifier.verdict(&Likelihoods::default()),
            Verdict::Inconclusive
        );
    }
}
