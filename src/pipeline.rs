// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Per-cycle pipeline: readings → normalize → score → classify → [`Sample`].
//!
//! The pipeline owns the only mutable trend state (trailing window, rolling
//! latency window, last throughput measurement). It is driven by a single
//! producer; appending and publishing the resulting sample is the caller's
//! job.

use crate::classifier::{Classifier, ClassifierInput};
use crate::collector::{CycleInput, ThroughputReading};
use crate::config::EngineConfig;
use crate::context::LongContext;
use crate::sample::{CellIdentity, Sample, Verdict};
use crate::scoring::ScoringEngine;
use crate::shape::{analyze_shape, consistency, Shape};
use crate::window::{LatencyWindow, TrailingWindow, WindowEntry};
use chrono::{DateTime, Utc};

/// What the last throughput transfer showed beyond its rates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct TransferTraits {
    latency_diff: Option<f64>,
    shape: Shape,
    consistency: Option<f64>,
}

/// Stateful sample builder
#[derive(Debug, Clone)]
pub struct Pipeline {
    scoring: ScoringEngine,
    classifier: Classifier,
    window: TrailingWindow,
    latency_window: LatencyWindow,
    context: LongContext,
    last_throughput: Option<ThroughputReading>,
    last_transfer: TransferTraits,
    last_timestamp: Option<DateTime<Utc>>,
    cycles: u64,
}

impl Pipeline {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            scoring: ScoringEngine::new(config.normalizer.clone(), config.scoring.clone()),
            classifier: Classifier::new(config.classifier.clone()),
            window: TrailingWindow::new(config.classifier.window),
            latency_window: LatencyWindow::new(config.history.jitter_window),
            context: LongContext::new(config.context.clone()),
            last_throughput: None,
            last_transfer: TransferTraits::default(),
            last_timestamp: None,
            cycles: 0,
        }
    }

    /// Turn one cycle's readings into a sample.
    ///
    /// Never fails: missing readings degrade to neutral inputs. Timestamps
    /// earlier than the previous sample are raised to it so the sequence
    /// stays non-decreasing.
    pub fn process(&mut self, input: CycleInput, timestamp: DateTime<Utc>) -> Sample {
        let timestamp = match self.last_timestamp {
            Some(last) if timestamp < last => last,
            _ => timestamp,
        };

        let metrics = input
            .radio
            .as_ref()
            .map(|r| r.metrics())
            .unwrap_or_default();
        let cell = input
            .radio
            .as_ref()
            .map(|r| r.cell())
            .unwrap_or_else(CellIdentity::unknown);

        // Idle RTTs feed jitter; under-load RTTs only when no idle probe ran
        let (latency_avg, packet_loss, fresh_rtts) = match input.latency.as_ref() {
            Some(reading) => {
                self.latency_window.extend(&reading.latency_samples);
                (
                    reading.average(),
                    reading.packet_loss.clamp(0.0, 100.0),
                    !reading.latency_samples.is_empty(),
                )
            }
            None => match input.throughput.as_ref() {
                Some(throughput) => {
                    self.latency_window.extend(&throughput.latency_samples);
                    (None, 0.0, !throughput.latency_samples.is_empty())
                }
                None => (None, 0.0, false),
            },
        };
        // Jitter is evidence only when this cycle brought new RTTs
        let jitter = if fresh_rtts && !self.latency_window.is_empty() {
            Some(self.latency_window.jitter())
        } else {
            None
        };

        // Throughput is probed rarely; carry the last measurement forward
        let mut data_bytes = 0;
        if let Some(throughput) = input.throughput {
            data_bytes = throughput.total_bytes;
            self.last_transfer = self.transfer_traits(&throughput, latency_avg);
            self.last_throughput = Some(throughput);
        }

        let (down_mbps, down_mbps_initial, up_mbps) = match self.last_throughput.as_ref() {
            Some(t) => (
                Some(t.down_mbps.max(0.0)),
                Some(t.down_mbps_initial.max(0.0)),
                t.up_mbps.max(0.0),
            ),
            None => (None, None, 0.0),
        };

        let stable_hour = self.context.is_stable_hour(timestamp);
        let scores = self.scoring.evaluate(&metrics, down_mbps, down_mbps_initial);
        let traits = self.last_transfer;
        let classifier_input = ClassifierInput {
            score: scores.score,
            psi: scores.psi,
            ramp_up_ratio: scores.ramp_up_ratio,
            ramp_down: self.scoring.is_ramp_down(scores.ramp_up_ratio),
            latency_avg,
            jitter,
            packet_loss,
            latency_diff: traits.latency_diff,
            shape: traits.shape,
            consistency: traits.consistency,
            stable_hour,
        };
        let likelihoods = self.classifier.classify(&classifier_input, &self.window);
        let verdict = self.classifier.verdict(&likelihoods);
        // Counted before this sample joins the context
        let confident = verdict != Verdict::Policy || self.context.is_confident(timestamp);

        let sample = Sample {
            timestamp,
            sinr: metrics.sinr,
            rsrq: metrics.rsrq,
            rsrp: metrics.rsrp,
            band: cell.band,
            pci: cell.pci,
            enodeb: cell.enodeb,
            down_mbps: down_mbps.unwrap_or(0.0),
            down_mbps_initial: down_mbps_initial.unwrap_or(0.0),
            up_mbps,
            latency_avg: latency_avg.unwrap_or(0.0),
            jitter: jitter.unwrap_or(0.0),
            packet_loss,
            latency_diff: traits.latency_diff.unwrap_or(0.0),
            data_bytes,
            monthly_bytes: self.context.usage_bytes(timestamp, data_bytes),
            score: scores.score,
            psi: scores.psi,
            ramp_up_ratio: scores.ramp_up_ratio,
            consistency: traits.consistency.unwrap_or(0.0),
            shape: traits.shape,
            radio_prob: likelihoods.radio,
            congestion_prob: likelihoods.congestion,
            policy_prob: likelihoods.policy,
            verdict,
            stable_hour,
            confident,
            degraded: input.degraded,
        };

        // Updated after classification: a sample never sees itself
        self.window.push(WindowEntry {
            score: sample.score,
            psi: sample.psi,
            latency: latency_avg,
            jitter,
            congested: self.is_congested(&sample),
        });
        self.context.observe(&sample);
        self.last_timestamp = Some(timestamp);
        self.cycles += 1;

        sample
    }

    /// Rebuild trend context from previously persisted samples (oldest first).
    pub fn warm(&mut self, history: &[Sample]) {
        for sample in history {
            let measured = sample.latency_avg > 0.0;
            self.window.push(WindowEntry {
                score: sample.score,
                psi: sample.psi,
                latency: measured.then_some(sample.latency_avg),
                jitter: (sample.jitter > 0.0).then_some(sample.jitter),
                congested: self.is_congested(sample),
            });
            self.context.observe(sample);
        }
        if let Some(last) = history.last() {
            self.last_timestamp = Some(last.timestamp);
            if last.down_mbps > 0.0 {
                self.last_throughput = Some(ThroughputReading {
                    down_mbps: last.down_mbps,
                    down_mbps_initial: last.down_mbps_initial,
                    up_mbps: last.up_mbps,
                    ..Default::default()
                });
                self.last_transfer = TransferTraits {
                    latency_diff: Some(last.latency_diff),
                    shape: last.shape,
                    consistency: (last.shape != Shape::Uncertain).then_some(last.consistency),
                };
            }
        }
    }

    /// Latency-under-load difference, curve shape and rate consistency of a
    /// transfer. The idle reference is this cycle's ping, else the calm
    /// baseline of the trailing window.
    fn transfer_traits(&self, throughput: &ThroughputReading, idle: Option<f64>) -> TransferTraits {
        let idle = idle.or_else(|| {
            let baseline = self.window.baseline_latency();
            (baseline.count > 0).then_some(baseline.mean)
        });
        let latency_diff = match (throughput.loaded_latency(), idle) {
            (Some(loaded), Some(idle)) => Some(loaded - idle),
            _ => None,
        };
        TransferTraits {
            latency_diff,
            shape: analyze_shape(&throughput.rate_samples),
            consistency: consistency(&throughput.rate_samples),
        }
    }

    fn is_congested(&self, sample: &Sample) -> bool {
        sample.congestion_prob > self.classifier.config().verdict_threshold
    }

    /// PSI of the most recent cycle, used to trigger early probes
    pub fn last_psi(&self) -> Option<f64> {
        self.window.iter().last().map(|e| e.psi)
    }

    /// Cycles processed since construction
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{LatencyReading, RadioReading};
    use crate::sample::UNKNOWN_ID;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn strong_radio() -> RadioReading {
        RadioReading {
            sinr: Some(28.0),
            rsrq: Some(-5.0),
            rsrp: Some(-72.0),
            band: Some("B3".to_string()),
            pci: Some("101".to_string()),
            enodeb: Some("51234".to_string()),
        }
    }

    #[test]
    fn test_all_collectors_down_still_produces_sample() {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let sample = pipeline.process(
            CycleInput {
                degraded: true,
                ..Default::default()
            },
            t0(),
        );
        assert_eq!(sample.score, 50.0);
        assert_eq!(sample.psi, 0.0);
        assert_eq!(sample.ramp_up_ratio, 1.0);
        assert_eq!(sample.band, UNKNOWN_ID);
        assert!(sample.degraded);
        assert_eq!(sample.verdict, Verdict::Inconclusive);
    }

    #[test]
    fn test_throughput_carried_forward() {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let first = pipeline.process(
            CycleInput {
                radio: Some(strong_radio()),
                throughput: Some(ThroughputReading {
                    down_mbps: 5.0,
                    down_mbps_initial: 12.0,
                    up_mbps: 2.0,
                    ..Default::default()
                }),
                ..Default::default()
            },
            t0(),
        );
        let second = pipeline.process(
            CycleInput {
                radio: Some(strong_radio()),
                ..Default::default()
            },
            t0() + Duration::seconds(10),
        );
        assert_eq!(second.down_mbps, first.down_mbps);
        assert_eq!(second.ramp_up_ratio, first.ramp_up_ratio);
        assert!(first.ramp_up_ratio > 2.0);
        assert!(second.psi > 50.0);
    }

    #[test]
    fn test_shaped_link_classified_as_policy() {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let sample = pipeline.process(
            CycleInput {
                radio: Some(strong_radio()),
                latency: Some(LatencyReading {
                    latency_samples: vec![35.0, 36.0, 34.0],
                    packet_loss: 0.0,
                }),
                throughput: Some(ThroughputReading {
                    down_mbps: 4.0,
                    down_mbps_initial: 20.0,
                    up_mbps: 1.0,
                    ..Default::default()
                }),
                degraded: false,
            },
            t0(),
        );
        assert!(sample.score >= 90.0);
        assert_eq!(sample.verdict, Verdict::Policy);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let a = pipeline.process(CycleInput::default(), t0());
        let b = pipeline.process(CycleInput::default(), t0() - Duration::seconds(30));
        assert!(b.timestamp >= a.timestamp);
        assert_eq!(pipeline.cycles(), 2);
    }

    #[test]
    fn test_jitter_from_rolling_window() {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let sample = pipeline.process(
            CycleInput {
                latency: Some(LatencyReading {
                    latency_samples: vec![30.0, 50.0],
                    packet_loss: 0.0,
                }),
                ..Default::default()
            },
            t0(),
        );
        assert_eq!(sample.latency_avg, 40.0);
        assert!((sample.jitter - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_ping_carries_no_jitter() {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let measured = pipeline.process(
            CycleInput {
                latency: Some(LatencyReading {
                    latency_samples: vec![30.0, 50.0],
                    packet_loss: 0.0,
                }),
                ..Default::default()
            },
            t0(),
        );
        assert!(measured.jitter > 0.0);

        let failed = pipeline.process(
            CycleInput {
                degraded: true,
                ..Default::default()
            },
            t0() + Duration::seconds(10),
        );
        assert_eq!(failed.jitter, 0.0);

        // Every reply lost: no new RTTs either
        let silent = pipeline.process(
            CycleInput {
                latency: Some(LatencyReading {
                    latency_samples: vec![],
                    packet_loss: 100.0,
                }),
                ..Default::default()
            },
            t0() + Duration::seconds(20),
        );
        assert_eq!(silent.jitter, 0.0);
        assert_eq!(silent.packet_loss, 100.0);
    }

    #[test]
    fn test_transfer_traits_and_data_usage() {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let probe = || ThroughputReading {
            down_mbps: 4.0,
            down_mbps_initial: 20.0,
            up_mbps: 1.0,
            latency_samples: vec![90.0, 110.0],
            rate_samples: vec![20.0, 19.0, 4.1, 3.9, 4.0, 4.0, 4.1, 3.9],
            total_bytes: 6_000_000,
        };
        let first = pipeline.process(
            CycleInput {
                radio: Some(strong_radio()),
                latency: Some(LatencyReading {
                    latency_samples: vec![35.0, 45.0],
                    packet_loss: 0.0,
                }),
                throughput: Some(probe()),
                degraded: false,
            },
            t0(),
        );
        assert_eq!(first.latency_diff, 60.0);
        assert_eq!(first.shape, Shape::Plateau);
        assert!(first.consistency > 0.8);
        assert_eq!(first.data_bytes, 6_000_000);
        assert_eq!(first.monthly_bytes, 6_000_000);

        // Between probes the traits carry forward but no bytes are spent
        let idle = pipeline.process(CycleInput::default(), t0() + Duration::seconds(10));
        assert_eq!(idle.shape, Shape::Plateau);
        assert_eq!(idle.data_bytes, 0);
        assert_eq!(idle.monthly_bytes, 6_000_000);

        let second = pipeline.process(
            CycleInput {
                throughput: Some(probe()),
                ..Default::default()
            },
            t0() + Duration::seconds(20),
        );
        assert_eq!(second.monthly_bytes, 12_000_000);
        // No idle ping this cycle: the window baseline (40 ms) is the reference
        assert_eq!(second.latency_diff, 60.0);
    }

    #[test]
    fn test_policy_confident_after_confirmations() {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let shaped = || CycleInput {
            radio: Some(strong_radio()),
            throughput: Some(ThroughputReading {
                down_mbps: 4.0,
                down_mbps_initial: 20.0,
                up_mbps: 1.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let samples: Vec<Sample> = (0..4)
            .map(|i| pipeline.process(shaped(), t0() + Duration::seconds(10 * i)))
            .collect();
        assert!(samples.iter().all(|s| s.verdict == Verdict::Policy));
        let confident: Vec<bool> = samples.iter().map(|s| s.confident).collect();
        assert_eq!(confident, vec![false, false, false, true]);
        assert_eq!(samples[0].headline(), crate::sample::LOW_CONFIDENCE_HEADLINE);
    }

    #[test]
    fn test_warm_restores_context() {
        let mut original = Pipeline::new(&EngineConfig::default());
        let sample = original.process(
            CycleInput {
                radio: Some(strong_radio()),
                throughput: Some(ThroughputReading {
                    down_mbps: 8.0,
                    down_mbps_initial: 8.0,
                    up_mbps: 3.0,
                    ..Default::default()
                }),
                ..Default::default()
            },
            t0(),
        );

        let mut restored = Pipeline::new(&EngineConfig::default());
        restored.warm(std::slice::from_ref(&sample));
        assert_eq!(restored.last_psi(), Some(sample.psi));
        let next = restored.process(CycleInput::default(), t0() + Duration::seconds(10));
        assert_eq!(next.down_mbps, 8.0);
    }
}
