// NetForensics Sim - Traces
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Timestamped traces of cycle inputs.

use crate::generator::{LinkSimulator, SimConfig};
use crate::scenario::Timeline;
use chrono::{DateTime, Duration, TimeZone, Utc};
use netforensics::{CycleInput, Pipeline, Sample};
use serde::{Deserialize, Serialize};

/// Trace generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    pub start: DateTime<Utc>,
    /// Seconds between cycles.
    pub interval_secs: i64,
    /// Throughput probe every N cycles, starting with the first.
    pub probe_every: usize,
    pub sim: SimConfig,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            start: Utc
                .with_ymd_and_hms(2025, 1, 6, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            interval_secs: 10,
            probe_every: 1,
            sim: SimConfig::default(),
        }
    }
}

/// One cycle of a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceStep {
    pub timestamp: DateTime<Utc>,
    pub input: CycleInput,
}

/// Generated sequence of cycle inputs.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
}

impl Trace {
    /// Generate a trace following `timeline`.
    pub fn generate(config: &TraceConfig, timeline: &Timeline) -> Self {
        let first = timeline.scenario_at(0).unwrap_or_default();
        let mut sim = LinkSimulator::new(config.sim.clone(), first);
        let every = config.probe_every.max(1);

        let steps = (0..timeline.len())
            .filter_map(|i| {
                let scenario = timeline.scenario_at(i)?;
                if scenario != sim.scenario() {
                    sim.set_scenario(scenario);
                }
                Some(TraceStep {
                    timestamp: config.start + Duration::seconds(config.interval_secs * i as i64),
                    input: sim.next_cycle(i % every == 0),
                })
            })
            .collect();
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Feed every step through `pipeline`.
    pub fn run(&self, pipeline: &mut Pipeline) -> Vec<Sample> {
        self.steps
            .iter()
            .map(|step| pipeline.process(step.input.clone(), step.timestamp))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;
    use netforensics::EngineConfig;

    #[test]
    fn test_trace_timestamps_and_probes() {
        let config = TraceConfig {
            probe_every: 3,
            sim: SimConfig::new().with_seed(11),
            ..Default::default()
        };
        let trace = Trace::generate(&config, &Timeline::constant(Scenario::Clean, 7));
        assert_eq!(trace.len(), 7);
        assert_eq!(
            trace.steps[1].timestamp - trace.steps[0].timestamp,
            Duration::seconds(10)
        );
        let probed: Vec<bool> = trace
            .steps
            .iter()
            .map(|s| s.input.throughput.is_some())
            .collect();
        assert_eq!(probed, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_run_produces_one_sample_per_step() {
        let config = TraceConfig {
            sim: SimConfig::new().with_seed(5),
            ..Default::default()
        };
        let trace = Trace::generate(&config, &Timeline::constant(Scenario::Clean, 12));
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let samples = trace.run(&mut pipeline);
        assert_eq!(samples.len(), 12);
        assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
