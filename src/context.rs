// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Long-horizon context
//!
//! The trailing window only covers the last few minutes. Some evidence needs
//! days: whether the signal at this hour of day has been steady all week,
//! how many earlier cycles already pointed at a shaper, and how much mobile
//! data the probes have spent this month. [`LongContext`] keeps compact
//! per-day and per-hour aggregates for that instead of raw samples.

use crate::config::ContextConfig;
use crate::sample::{Sample, Verdict};
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use std::collections::{BTreeMap, VecDeque};

/// Running sums for one (day, hour) bucket
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ScoreSums {
    count: u64,
    sum: f64,
    sum_sq: f64,
}

impl ScoreSums {
    fn add(&mut self, score: f64) {
        self.count += 1;
        self.sum += score;
        self.sum_sq += score * score;
    }

    fn merge(&mut self, other: &ScoreSums) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    /// Population standard deviation
    fn std(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        (self.sum_sq / n - mean * mean).max(0.0).sqrt()
    }
}

/// Day-scale aggregates behind the stable-hour, confidence and data-usage
/// figures.
#[derive(Debug, Clone)]
pub struct LongContext {
    config: ContextConfig,
    /// Scores per (UTC day, hour of day)
    hours: BTreeMap<(NaiveDate, u32), ScoreSums>,
    /// Timestamps of policy verdicts within the lookback
    policy: VecDeque<DateTime<Utc>>,
    /// Probe bytes per UTC day
    usage: BTreeMap<NaiveDate, u64>,
}

impl LongContext {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            hours: BTreeMap::new(),
            policy: VecDeque::new(),
            usage: BTreeMap::new(),
        }
    }

    /// Fold a finished sample into the aggregates.
    pub fn observe(&mut self, sample: &Sample) {
        let ts = sample.timestamp;
        if sample.score.is_finite() {
            self.hours
                .entry((ts.date_naive(), ts.hour()))
                .or_default()
                .add(sample.score);
        }
        if sample.verdict == Verdict::Policy {
            self.policy.push_back(ts);
        }
        if sample.data_bytes > 0 {
            *self.usage.entry(ts.date_naive()).or_default() += sample.data_bytes;
        }
        self.prune(ts);
    }

    /// Whether the score at `now`'s hour of day has been steady over the
    /// lookback: more than `stable_hour_min_samples` samples with a
    /// population standard deviation below `stable_hour_max_std`.
    pub fn is_stable_hour(&self, now: DateTime<Utc>) -> bool {
        let cutoff = (now - self.lookback()).date_naive();
        let hour = now.hour();
        let mut total = ScoreSums::default();
        for sums in self
            .hours
            .range((cutoff, 0)..)
            .filter(|((_, h), _)| *h == hour)
            .map(|(_, sums)| sums)
        {
            total.merge(sums);
        }
        total.count > self.config.stable_hour_min_samples
            && total.std() < self.config.stable_hour_max_std
    }

    /// Policy verdicts within the lookback before `now`
    pub fn policy_count(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.lookback();
        self.policy.iter().filter(|t| **t >= cutoff).count()
    }

    /// Whether a policy verdict at `now` is backed by enough earlier ones
    pub fn is_confident(&self, now: DateTime<Utc>) -> bool {
        self.policy_count(now) >= self.config.min_policy_confirmations
    }

    /// Probe bytes spent over the usage period ending at `now`, inclusive
    /// of `extra` bytes not yet observed.
    pub fn usage_bytes(&self, now: DateTime<Utc>, extra: u64) -> u64 {
        let cutoff = (now - Duration::days(self.config.usage_days)).date_naive();
        self.usage
            .range(cutoff..)
            .map(|(_, bytes)| *bytes)
            .sum::<u64>()
            .saturating_add(extra)
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    fn lookback(&self) -> Duration {
        Duration::days(self.config.lookback_days)
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let hours_cutoff = (now - self.lookback()).date_naive();
        self.hours.retain(|(day, _), _| *day >= hours_cutoff);

        let policy_cutoff = now - self.lookback();
        while self.policy.front().is_some_and(|t| *t < policy_cutoff) {
            self.policy.pop_front();
        }

        let usage_cutoff = (now - Duration::days(self.config.usage_days)).date_naive();
        self.usage.retain(|day, _| *day >= usage_cutoff);
    }
}

impl Default for LongContext {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}
