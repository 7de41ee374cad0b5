// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Aggregation over history slices
//!
//! The [`Aggregator`] derives read-only views from a slice of samples:
//! a day × hour heatmap of mean PSI, the accountability log of anomalous
//! samples, and the per-hour worst score over a trailing period.

use crate::config::AggregatorConfig;
use crate::sample::Sample;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Hours in a calendar day
pub const HOURS: usize = 24;

/// One heatmap row. `None` means no samples fell into that hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapDay {
    pub date: NaiveDate,
    pub hours: Vec<Option<f64>>,
}

/// Mean PSI per (day, hour), oldest day first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub days: Vec<HeatmapDay>,
}

impl Heatmap {
    /// Cell value, `None` for "no data" or an unknown day
    pub fn get(&self, date: NaiveDate, hour: usize) -> Option<f64> {
        self.days
            .iter()
            .find(|d| d.date == date)
            .and_then(|d| d.hours.get(hour).copied().flatten())
    }
}

/// Why a sample was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyLabel {
    #[serde(rename = "policy-like pattern")]
    PolicyLike,
    #[serde(rename = "congestion pattern")]
    Congestion,
    #[serde(rename = "elevated PSI")]
    ElevatedPsi,
    #[serde(rename = "suspicious activity")]
    Suspicious,
}

impl AnomalyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PolicyLike => "policy-like pattern",
            Self::Congestion => "congestion pattern",
            Self::ElevatedPsi => "elevated PSI",
            Self::Suspicious => "suspicious activity",
        }
    }
}

impl fmt::Display for AnomalyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accountability-log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub label: AnomalyLabel,
    #[serde(flatten)]
    pub sample: Sample,
}

/// History aggregation
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Bucket samples by local (day, hour) and average their PSI, keeping
    /// the `days` most recent distinct days that have data.
    pub fn heatmap(&self, samples: &[Arc<Sample>], days: usize) -> Heatmap {
        let offset = self.offset();
        let mut buckets: BTreeMap<NaiveDate, [(f64, u32); HOURS]> = BTreeMap::new();

        for sample in samples.iter().filter(|s| s.psi.is_finite()) {
            let local = sample.timestamp.with_timezone(&offset);
            let cell = &mut buckets.entry(local.date_naive()).or_insert([(0.0, 0); HOURS])
                [local.hour() as usize];
            cell.0 += sample.psi;
            cell.1 += 1;
        }

        let keep = days.max(1);
        let skip = buckets.len().saturating_sub(keep);
        Heatmap {
            days: buckets
                .into_iter()
                .skip(skip)
                .map(|(date, cells)| HeatmapDay {
                    date,
                    hours: cells
                        .iter()
                        .map(|&(sum, n)| (n > 0).then(|| sum / n as f64))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Heatmap over the configured number of days
    pub fn default_heatmap(&self, samples: &[Arc<Sample>]) -> Heatmap {
        self.heatmap(samples, self.config.heatmap_days)
    }

    /// Whether a sample belongs in the accountability log
    pub fn is_anomalous(&self, sample: &Sample) -> bool {
        sample.psi > self.config.anomaly_psi || sample.policy_prob > self.config.label_threshold
    }

    /// Label by precedence: policy, congestion, elevated PSI, catch-all
    pub fn label(&self, sample: &Sample) -> AnomalyLabel {
        let t = self.config.label_threshold;
        if sample.policy_prob > t {
            AnomalyLabel::PolicyLike
        } else if sample.congestion_prob > t {
            AnomalyLabel::Congestion
        } else if sample.psi > self.config.elevated_psi {
            AnomalyLabel::ElevatedPsi
        } else {
            AnomalyLabel::Suspicious
        }
    }

    /// Anomalous samples, most recent first, capped at `anomaly_limit`
    pub fn anomalies(&self, samples: &[Arc<Sample>]) -> Vec<Anomaly> {
        samples
            .iter()
            .rev()
            .filter(|s| self.is_anomalous(s))
            .take(self.config.anomaly_limit)
            .map(|s| Anomaly {
                label: self.label(s),
                sample: Sample::clone(s),
            })
            .collect()
    }

    /// Worst (lowest) score seen at each local hour of day within the last
    /// `days` days before `now`. `None` where no sample exists.
    pub fn hourly_floor(
        &self,
        samples: &[Arc<Sample>],
        now: DateTime<Utc>,
        days: i64,
    ) -> Vec<Option<f64>> {
        let offset = self.offset();
        let cutoff = now - Duration::days(days.max(0));
        let mut floor: Vec<Option<f64>> = vec![None; HOURS];

        for sample in samples
            .iter()
            .filter(|s| s.timestamp >= cutoff && s.timestamp <= now && s.score.is_finite())
        {
            let hour = sample.timestamp.with_timezone(&offset).hour() as usize;
            let slot = &mut floor[hour];
            *slot = Some(slot.map_or(sample.score, |v| v.min(sample.score)));
        }
        floor
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.config.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}
