// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Engine configuration.
//!
//! Every heuristic threshold used by scoring and classification lives here
//! so it can be tuned and tested independently of the code that applies it.

use crate::error::{ForensicsError, Result};
use serde::{Deserialize, Serialize};

/// Master configuration for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Plausible raw ranges for radio metrics.
    pub normalizer: NormalizerConfig,

    /// Composite score, expected-throughput curve and ramp detection.
    pub scoring: ScoringConfig,

    /// Probability shaping and verdict thresholds.
    pub classifier: ClassifierConfig,

    /// Retention of the in-memory history.
    pub history: HistoryConfig,

    /// Heatmap and anomaly extraction.
    pub aggregator: AggregatorConfig,

    /// Throughput probe cadence.
    pub schedule: ScheduleConfig,

    /// Day-scale context: stable hours, policy confirmations, data usage.
    pub context: ContextConfig,
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ForensicsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        self.normalizer.validate()?;
        self.scoring.validate()?;
        self.classifier.validate()?;
        self.history.validate()?;
        self.aggregator.validate()?;
        self.context.validate()?;
        Ok(())
    }
}

/// Inclusive range `worst..best` mapped onto `0..1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRange {
    pub worst: f64,
    pub best: f64,
}

impl MetricRange {
    pub const fn new(worst: f64, best: f64) -> Self {
        Self { worst, best }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.worst.is_finite() || !self.best.is_finite() || self.worst >= self.best {
            return Err(ForensicsError::InvalidConfig(format!(
                "{name} range must satisfy worst < best, got {}..{}",
                self.worst, self.best
            )));
        }
        Ok(())
    }
}

/// Radio metric ranges (dB / dBm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub sinr: MetricRange,
    pub rsrq: MetricRange,
    pub rsrp: MetricRange,
    /// Value substituted for an absent reading.
    pub neutral: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            sinr: MetricRange::new(-10.0, 30.0),
            rsrq: MetricRange::new(-20.0, -3.0),
            rsrp: MetricRange::new(-120.0, -70.0),
            neutral: 0.5,
        }
    }
}

impl NormalizerConfig {
    fn validate(&self) -> Result<()> {
        self.sinr.validate("sinr")?;
        self.rsrq.validate("rsrq")?;
        self.rsrp.validate("rsrp")?;
        if !(0.0..=1.0).contains(&self.neutral) {
            return Err(ForensicsError::InvalidConfig(format!(
                "neutral must be within 0..1, got {}",
                self.neutral
            )));
        }
        Ok(())
    }
}

/// Scoring engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// SINR weight (primary LTE quality indicator).
    pub weight_sinr: f64,
    pub weight_rsrq: f64,
    pub weight_rsrp: f64,
    /// Expected downlink at score 0 (Mbps).
    pub expected_floor_mbps: f64,
    /// Expected downlink at score 100 (Mbps).
    pub expected_ceiling_mbps: f64,
    /// Ramp-up ratio above which a burst-then-throttle pattern is suspected.
    pub ramp_threshold: f64,
    /// Guard against division by a vanishing sustained rate.
    pub epsilon_mbps: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_sinr: 0.45,
            weight_rsrq: 0.35,
            weight_rsrp: 0.20,
            expected_floor_mbps: 1.0,
            expected_ceiling_mbps: 30.0,
            ramp_threshold: 1.2,
            epsilon_mbps: 1e-3,
        }
    }
}

impl ScoringConfig {
    fn validate(&self) -> Result<()> {
        let weights = [self.weight_sinr, self.weight_rsrq, self.weight_rsrp];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ForensicsError::InvalidConfig(
                "metric weights must be non-negative".to_string(),
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ForensicsError::InvalidConfig(format!(
                "metric weights must sum to 1, got {sum}"
            )));
        }
        if self.expected_floor_mbps <= 0.0 || self.expected_ceiling_mbps <= self.expected_floor_mbps
        {
            return Err(ForensicsError::InvalidConfig(format!(
                "expected throughput curve must satisfy 0 < floor < ceiling, got {}..{}",
                self.expected_floor_mbps, self.expected_ceiling_mbps
            )));
        }
        if self.ramp_threshold <= 1.0 {
            return Err(ForensicsError::InvalidConfig(format!(
                "ramp_threshold must exceed 1.0, got {}",
                self.ramp_threshold
            )));
        }
        if self.epsilon_mbps <= 0.0 {
            return Err(ForensicsError::InvalidConfig(
                "epsilon_mbps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Classifier parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Trailing samples used for trend and baseline context.
    pub window: usize,
    /// Below this many trailing measurements the absolute references are used.
    pub min_baseline_samples: usize,
    /// PSI above which throughput is considered to under-perform.
    pub psi_elevated: f64,
    /// PSI at which policy evidence saturates.
    pub psi_saturation: f64,
    /// Ramp-up ratio at which ramp evidence saturates.
    pub ramp_saturation: f64,
    /// Steepness of the radio likelihood curve.
    pub radio_steepness: f64,
    /// Score at or below which the radio is considered unhealthy.
    pub radio_gate_low: f64,
    /// Score at or above which the radio is considered healthy.
    pub radio_gate_high: f64,
    /// Latency / jitter inflation ratio at which congestion evidence saturates.
    pub inflation_saturation: f64,
    /// Reference latency when no baseline exists yet (ms).
    pub latency_reference_ms: f64,
    /// Reference jitter when no baseline exists yet (ms).
    pub jitter_reference_ms: f64,
    /// Packet loss (%) at which loss evidence saturates.
    pub loss_saturation_pct: f64,
    /// Latency that counts as congestion evidence whatever the baseline (ms).
    pub latency_high_ms: f64,
    /// Jitter that counts as congestion evidence whatever the baseline (ms).
    pub jitter_high_ms: f64,
    /// Latency-under-load increase where load evidence starts (ms).
    pub load_diff_low_ms: f64,
    /// Latency-under-load increase where load evidence saturates (ms).
    pub load_diff_high_ms: f64,
    /// Latency-under-load increase above which policy evidence is cut (ms).
    pub load_diff_extreme_ms: f64,
    /// Jitter above which policy evidence is halved (ms).
    pub jitter_extreme_ms: f64,
    /// Probability above which a hypothesis is reported.
    pub verdict_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            window: 20,
            min_baseline_samples: 5,
            psi_elevated: 50.0,
            psi_saturation: 80.0,
            ramp_saturation: 2.0,
            radio_steepness: 8.0,
            radio_gate_low: 40.0,
            radio_gate_high: 70.0,
            inflation_saturation: 2.0,
            latency_reference_ms: 60.0,
            jitter_reference_ms: 10.0,
            loss_saturation_pct: 5.0,
            latency_high_ms: 150.0,
            jitter_high_ms: 30.0,
            load_diff_low_ms: 20.0,
            load_diff_high_ms: 50.0,
            load_diff_extreme_ms: 200.0,
            jitter_extreme_ms: 100.0,
            verdict_threshold: 0.5,
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(ForensicsError::InvalidConfig(
                "classifier window must hold at least one sample".to_string(),
            ));
        }
        if !(0.0..100.0).contains(&self.psi_elevated) || self.psi_saturation <= self.psi_elevated {
            return Err(ForensicsError::InvalidConfig(format!(
                "psi thresholds must satisfy 0 <= elevated < saturation, got {} / {}",
                self.psi_elevated, self.psi_saturation
            )));
        }
        if self.radio_gate_high <= self.radio_gate_low {
            return Err(ForensicsError::InvalidConfig(
                "radio_gate_high must exceed radio_gate_low".to_string(),
            ));
        }
        if self.inflation_saturation <= 1.0 || self.ramp_saturation <= 1.0 {
            return Err(ForensicsError::InvalidConfig(
                "saturation ratios must exceed 1.0".to_string(),
            ));
        }
        if self.latency_reference_ms <= 0.0
            || self.jitter_reference_ms <= 0.0
            || self.loss_saturation_pct <= 0.0
        {
            return Err(ForensicsError::InvalidConfig(
                "reference values must be positive".to_string(),
            ));
        }
        if self.latency_high_ms <= 0.0 || self.jitter_high_ms <= 0.0 {
            return Err(ForensicsError::InvalidConfig(
                "absolute congestion floors must be positive".to_string(),
            ));
        }
        if self.load_diff_high_ms <= self.load_diff_low_ms {
            return Err(ForensicsError::InvalidConfig(format!(
                "load_diff_high_ms must exceed load_diff_low_ms, got {} / {}",
                self.load_diff_high_ms, self.load_diff_low_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.verdict_threshold) {
            return Err(ForensicsError::InvalidConfig(format!(
                "verdict_threshold must be within 0..1, got {}",
                self.verdict_threshold
            )));
        }
        Ok(())
    }
}

/// History retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum samples kept in memory.
    pub capacity: usize,
    /// Samples older than this (relative to the newest) are evicted.
    pub max_age_secs: Option<u64>,
    /// Trailing latency observations used to derive jitter.
    pub jitter_window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 50_000,
            max_age_secs: Some(35 * 24 * 3600),
            jitter_window: 20,
        }
    }
}

impl HistoryConfig {
    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ForensicsError::InvalidConfig(
                "history capacity must be positive".to_string(),
            ));
        }
        if self.jitter_window < 2 {
            return Err(ForensicsError::InvalidConfig(
                "jitter_window needs at least two observations".to_string(),
            ));
        }
        Ok(())
    }
}

/// Heatmap and anomaly extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Most recent distinct days shown in the heatmap.
    pub heatmap_days: usize,
    /// Maximum anomalies returned.
    pub anomaly_limit: usize,
    /// PSI above which a sample is anomalous.
    pub anomaly_psi: f64,
    /// PSI above which an anomaly is labelled "elevated PSI".
    pub elevated_psi: f64,
    /// Probability above which a policy/congestion label applies.
    pub label_threshold: f64,
    /// Offset from UTC used for calendar bucketing, in minutes.
    pub utc_offset_minutes: i32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            heatmap_days: 5,
            anomaly_limit: 20,
            anomaly_psi: 50.0,
            elevated_psi: 80.0,
            label_threshold: 0.5,
            utc_offset_minutes: 0,
        }
    }
}

impl AggregatorConfig {
    fn validate(&self) -> Result<()> {
        if self.heatmap_days == 0 || self.anomaly_limit == 0 {
            return Err(ForensicsError::InvalidConfig(
                "heatmap_days and anomaly_limit must be positive".to_string(),
            ));
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ForensicsError::InvalidConfig(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }
}

/// Throughput probe cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Probe at least this often (seconds).
    pub baseline_interval_secs: u64,
    /// PSI above which an early probe is requested.
    pub psi_trigger: f64,
    /// Minimum time since the previous probe of any kind before a
    /// PSI-triggered probe (seconds).
    pub trigger_cooldown_secs: u64,
    /// Hard cap on probes per calendar day (data budget).
    pub max_daily_probes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            baseline_interval_secs: 4 * 3600,
            psi_trigger: 50.0,
            trigger_cooldown_secs: 900,
            max_daily_probes: 12,
        }
    }
}

/// Day-scale context windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Days looked back for stable hours and policy confirmations.
    pub lookback_days: i64,
    /// A stable hour needs strictly more samples than this.
    pub stable_hour_min_samples: u64,
    /// A stable hour's score standard deviation stays below this.
    pub stable_hour_max_std: f64,
    /// Earlier policy verdicts needed before a new one is reported confidently.
    pub min_policy_confirmations: usize,
    /// Days summed into the data-usage figure.
    pub usage_days: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            stable_hour_min_samples: 5,
            stable_hour_max_std: 10.0,
            min_policy_confirmations: 3,
            usage_days: 30,
        }
    }
}

impl ContextConfig {
    fn validate(&self) -> Result<()> {
        if self.lookback_days <= 0 || self.usage_days <= 0 {
            return Err(ForensicsError::InvalidConfig(
                "context windows must span at least one day".to_string(),
            ));
        }
        if self.stable_hour_max_std <= 0.0 {
            return Err(ForensicsError::InvalidConfig(
                "stable_hour_max_std must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
