// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # NetForensics
//!
//! Root-cause engine for cellular uplinks: was a slow connection caused by
//! the radio, by network congestion, or by an operator-side throughput
//! policy?
//!
//! ## Key Features
//!
//! - **Signal scoring**: SINR, RSRQ and RSRP folded into one 0-100 score
//! - **Policy Suspicion Index**: shortfall against what the signal supports
//! - **Root-cause likelihoods**: independent radio, congestion and policy
//!   probabilities with a precedence verdict
//! - **History and aggregation**: bounded rolling store, day × hour heatmap,
//!   accountability log of anomalous samples
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use netforensics::{
//!     CycleInput, EngineConfig, HistoryStore, Pipeline, RadioReading, StatePublisher,
//!     ThroughputReading, Verdict,
//! };
//!
//! let config = EngineConfig::default();
//! let mut pipeline = Pipeline::new(&config);
//! let history = HistoryStore::new(&config.history);
//! let state = StatePublisher::new();
//!
//! // Excellent signal, fast start, then capped at 4 Mbps
//! let input = CycleInput {
//!     radio: Some(RadioReading {
//!         sinr: Some(28.0),
//!         rsrq: Some(-5.0),
//!         rsrp: Some(-72.0),
//!         band: Some("B3".into()),
//!         pci: Some("101".into()),
//!         enodeb: Some("51234".into()),
//!     }),
//!     throughput: Some(ThroughputReading {
//!         down_mbps: 4.0,
//!         down_mbps_initial: 20.0,
//!         up_mbps: 1.0,
//!         ..Default::default()
//!     }),
//!     ..Default::default()
//! };
//!
//! let sample = pipeline.process(input, Utc::now());
//! assert_eq!(sample.verdict, Verdict::Policy);
//!
//! history.append(sample.clone());
//! state.publish(sample);
//! assert_eq!(history.read(10).unwrap().len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`normalize`]: Raw radio metric → [0, 1]
//! - [`scoring`]: Signal score, PSI, ramp-up ratio
//! - [`classifier`]: Radio / congestion / policy likelihoods
//! - [`pipeline`]: One cycle from readings to a [`Sample`]
//! - [`history`]: Rolling sample store
//! - [`aggregator`]: Heatmap, anomalies, hourly floor
//! - [`state`]: Latest-sample publication
//! - [`collector`]: Telemetry and probe traits
//! - [`shape`]: Throughput curve shape and rate consistency
//! - [`context`]: Stable hours, policy confirmations, data usage
//! - [`cells`], [`schedule`], [`health`]: Cell sessions, probe cadence,
//!   collector health

// Modules
pub mod aggregator;
pub mod cells;
pub mod classifier;
pub mod collector;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod history;
pub mod normalize;
pub mod pipeline;
pub mod sample;
pub mod schedule;
pub mod scoring;
pub mod shape;
pub mod state;
pub mod window;

// Re-exports for convenient access
pub use aggregator::{Aggregator, Anomaly, AnomalyLabel, Heatmap, HeatmapDay, HOURS};
pub use cells::{CellSession, CellTracker};
pub use classifier::{Classifier, ClassifierInput, Likelihoods};
pub use collector::{
    CycleInput, LatencyReading, NetworkProbe, RadioReading, TelemetrySource, ThroughputReading,
};
pub use config::{
    AggregatorConfig, ClassifierConfig, ContextConfig, EngineConfig, HistoryConfig, MetricRange,
    NormalizerConfig, ScheduleConfig, ScoringConfig,
};
pub use context::LongContext;
pub use error::{CollectorError, ForensicsError, Result};
pub use health::{ComponentHealth, HealthConfig, HealthMonitor, HealthReport, HealthStatus};
pub use history::HistoryStore;
pub use normalize::{Metric, Normalizer};
pub use pipeline::Pipeline;
pub use sample::{CellIdentity, Sample, Verdict, LOW_CONFIDENCE_HEADLINE, UNKNOWN_ID};
pub use schedule::{ProbeReason, ProbeScheduler};
pub use scoring::{RadioMetrics, Scores, ScoringEngine};
pub use shape::{analyze_shape, consistency, Shape};
pub use state::{StatePublisher, StateSnapshot};
pub use window::{FieldStats, LatencyWindow, TrailingWindow, WindowEntry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_cycle_to_readers() {
        let config = EngineConfig::default();
        let mut pipeline = Pipeline::new(&config);
        let history = HistoryStore::new(&config.history);
        let state = StatePublisher::new();
        let aggregator = Aggregator::new(config.aggregator.clone());
        let t0 = Utc.with_ymd_and_hms(2025, 4, 2, 9, 0, 0).unwrap();

        for i in 0..6 {
            let sample = pipeline.process(CycleInput::default(), t0 + Duration::seconds(i * 10));
            history.append(sample.clone());
            state.publish(sample);
        }

        let recent = history.read(50).unwrap();
        assert_eq!(recent.len(), 6);
        assert_eq!(state.latest().unwrap().timestamp, recent[5].timestamp);
        let heatmap = aggregator.default_heatmap(&recent);
        assert_eq!(heatmap.get(t0.date_naive(), 9), Some(0.0));
        assert!(aggregator.anomalies(&recent).is_empty());
    }
}
