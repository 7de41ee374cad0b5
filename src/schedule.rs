// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Throughput probe scheduling
//!
//! Throughput probes cost mobile data, so they run on a slow baseline
//! cadence, early when PSI spikes (no sooner than the cooldown after the
//! previous probe of any kind), and never more than `max_daily_probes`
//! times per UTC day.

use crate::config::ScheduleConfig;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

/// Why a probe was scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeReason {
    /// No probe has run yet
    Initial,
    /// Baseline interval elapsed
    Baseline,
    /// PSI crossed the trigger threshold
    PsiTrigger,
}

impl fmt::Display for ProbeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initial => "initial",
            Self::Baseline => "baseline",
            Self::PsiTrigger => "psi trigger",
        })
    }
}

/// Decides when the throughput probe runs
#[derive(Debug, Clone)]
pub struct ProbeScheduler {
    config: ScheduleConfig,
    last_probe: Option<DateTime<Utc>>,
    day: Option<NaiveDate>,
    daily_count: u32,
}

impl ProbeScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            last_probe: None,
            day: None,
            daily_count: 0,
        }
    }

    /// Whether a probe should run at `now` given the current PSI
    pub fn due(&self, now: DateTime<Utc>, psi: Option<f64>) -> Option<ProbeReason> {
        if self.probes_on(now.date_naive()) >= self.config.max_daily_probes {
            return None;
        }

        let Some(last) = self.last_probe else {
            return Some(ProbeReason::Initial);
        };
        if now - last >= secs(self.config.baseline_interval_secs) {
            return Some(ProbeReason::Baseline);
        }

        let triggered = psi.is_some_and(|p| p > self.config.psi_trigger);
        let cooled = now - last >= secs(self.config.trigger_cooldown_secs);
        if triggered && cooled {
            return Some(ProbeReason::PsiTrigger);
        }
        None
    }

    /// Count a probe against today's budget, whether or not it succeeded
    pub fn record(&mut self, now: DateTime<Utc>, reason: ProbeReason) {
        let today = now.date_naive();
        if self.day != Some(today) {
            self.day = Some(today);
            self.daily_count = 0;
        }
        self.daily_count += 1;
        self.last_probe = Some(now);

        #[cfg(feature = "logging")]
        log::debug!(
            "throughput probe ({}), {} of {} today",
            reason,
            self.daily_count,
            self.config.max_daily_probes
        );
        #[cfg(not(feature = "logging"))]
        let _ = reason;
    }

    /// Probes already run on `day`
    pub fn probes_on(&self, day: NaiveDate) -> u32 {
        if self.day == Some(day) {
            self.daily_count
        } else {
            0
        }
    }

    pub fn last_probe(&self) -> Option<DateTime<Utc>> {
        self.last_probe
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }
}

impl Default for ProbeScheduler {
    fn default() -> Self {
        Self::new(ScheduleConfig::default())
    }
}

fn secs(s: u64) -> Duration {
    Duration::seconds(i64::try_from(s).unwrap_or(i64::MAX / 1000))
}
